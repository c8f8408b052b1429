//! Form data wrapper for a bookmark being edited.
//!
//! `BookmarkFormData` owns the session's working copy of a [`Bookmark`] and
//! derives the payload the bookmarks API expects from it.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::types::bookmark::{AutoDeletePreference, Bookmark, BookmarkableType};

/// Wire payload for `POST /bookmarks` and `PUT /bookmarks/:id`.
///
/// Field names and order match what the server reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveData {
    pub reminder_at: Option<String>,
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub auto_delete_preference: AutoDeletePreference,
    pub bookmarkable_id: i64,
    pub bookmarkable_type: BookmarkableType,
}

impl SaveData {
    /// Flattens the payload into form parameters. A null reminder or name is
    /// sent as an empty value so an update clears it server-side.
    pub fn to_form_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(6);
        params.push(("reminder_at", self.reminder_at.clone().unwrap_or_default()));
        params.push(("name", self.name.clone().unwrap_or_default()));
        if let Some(id) = self.id {
            params.push(("id", id.to_string()));
        }
        params.push((
            "auto_delete_preference",
            self.auto_delete_preference.code().to_string(),
        ));
        params.push(("bookmarkable_id", self.bookmarkable_id.to_string()));
        params.push(("bookmarkable_type", self.bookmarkable_type.as_str().to_string()));
        params
    }

    /// Parses `reminder_at` back into an instant, if present and well formed.
    pub fn reminder_instant(&self) -> Option<DateTime<Utc>> {
        self.reminder_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Rebuilds a bookmark record from a saved payload, as the host keeps it.
    pub fn to_bookmark(&self) -> Bookmark {
        Bookmark {
            id: self.id,
            bookmarkable_id: self.bookmarkable_id,
            bookmarkable_type: self.bookmarkable_type,
            reminder_at: self.reminder_instant(),
            auto_delete_preference: self.auto_delete_preference,
            name: self.name.clone(),
            selected_datetime: None,
        }
    }
}

/// Formats an instant the way the server stores reminders
/// (`2024-01-15T09:00:00.000Z`).
pub fn format_reminder_at(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Working copy of one bookmark plus its derived payload.
#[derive(Debug, Clone, PartialEq)]
pub struct BookmarkFormData {
    bookmark: Bookmark,
}

impl BookmarkFormData {
    pub fn wrap(bookmark: Bookmark) -> Self {
        Self { bookmark }
    }

    pub fn bookmark(&self) -> &Bookmark {
        &self.bookmark
    }

    pub fn bookmark_mut(&mut self) -> &mut Bookmark {
        &mut self.bookmark
    }

    pub fn into_bookmark(self) -> Bookmark {
        self.bookmark
    }

    /// Records the ID returned by a create call. An ID, once set, never changes.
    pub fn assign_id(&mut self, id: i64) -> bool {
        if self.bookmark.id.is_some() {
            return false;
        }
        self.bookmark.id = Some(id);
        true
    }

    /// Drops both the stored and the selected reminder.
    pub fn clear_reminder(&mut self) {
        self.bookmark.selected_datetime = None;
        self.bookmark.reminder_at = None;
    }

    /// Reminder to send: the editor's selection wins over the stored value.
    pub fn reminder_at_iso(&self) -> Option<String> {
        self.bookmark
            .selected_datetime
            .or(self.bookmark.reminder_at)
            .map(format_reminder_at)
    }

    pub fn save_data(&self) -> SaveData {
        SaveData {
            reminder_at: self.reminder_at_iso(),
            name: self.bookmark.name.clone(),
            id: self.bookmark.id,
            auto_delete_preference: self.bookmark.auto_delete_preference,
            bookmarkable_id: self.bookmark.bookmarkable_id,
            bookmarkable_type: self.bookmark.bookmarkable_type,
        }
    }
}
