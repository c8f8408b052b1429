use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happens to a bookmark after its reminder fires.
///
/// Serialized as the server-side integer code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum AutoDeletePreference {
    Never,
    WhenReminderSent,
    OnOwnerReply,
    #[default]
    ClearReminder,
}

impl AutoDeletePreference {
    /// Every preference, in server code order.
    pub const ALL: [AutoDeletePreference; 4] = [
        AutoDeletePreference::Never,
        AutoDeletePreference::WhenReminderSent,
        AutoDeletePreference::OnOwnerReply,
        AutoDeletePreference::ClearReminder,
    ];

    pub fn code(self) -> u8 {
        match self {
            AutoDeletePreference::Never => 0,
            AutoDeletePreference::WhenReminderSent => 1,
            AutoDeletePreference::OnOwnerReply => 2,
            AutoDeletePreference::ClearReminder => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.code() == code)
    }

    /// Snake-case name used in locale keys (`bookmarks.auto_delete_preference.<key>`).
    pub fn key(self) -> &'static str {
        match self {
            AutoDeletePreference::Never => "never",
            AutoDeletePreference::WhenReminderSent => "when_reminder_sent",
            AutoDeletePreference::OnOwnerReply => "on_owner_reply",
            AutoDeletePreference::ClearReminder => "clear_reminder",
        }
    }

    pub fn locale_key(self) -> String {
        format!("bookmarks.auto_delete_preference.{}", self.key())
    }
}

impl From<AutoDeletePreference> for u8 {
    fn from(pref: AutoDeletePreference) -> Self {
        pref.code()
    }
}

impl TryFrom<u8> for AutoDeletePreference {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("unknown auto delete preference: {}", code))
    }
}

/// Kind of content a bookmark points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookmarkableType {
    Post,
    Topic,
}

impl BookmarkableType {
    pub fn as_str(self) -> &'static str {
        match self {
            BookmarkableType::Post => "Post",
            BookmarkableType::Topic => "Topic",
        }
    }
}

impl fmt::Display for BookmarkableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookmarkableType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Post" => Ok(BookmarkableType::Post),
            "Topic" => Ok(BookmarkableType::Topic),
            other => Err(format!("unknown bookmarkable type: {}", other)),
        }
    }
}

/// A bookmark as edited by one modal session.
///
/// `id` stays `None` until the first successful create. `selected_datetime`
/// is editor-local state and is never serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: Option<i64>,
    pub bookmarkable_id: i64,
    pub bookmarkable_type: BookmarkableType,
    pub reminder_at: Option<DateTime<Utc>>,
    pub auto_delete_preference: AutoDeletePreference,
    pub name: Option<String>,
    #[serde(skip)]
    pub selected_datetime: Option<DateTime<Utc>>,
}

impl Bookmark {
    /// Builds a fresh, never-saved bookmark for the given content item.
    pub fn create_for(
        bookmarkable_type: BookmarkableType,
        bookmarkable_id: i64,
        auto_delete_preference: AutoDeletePreference,
    ) -> Self {
        Self {
            id: None,
            bookmarkable_id,
            bookmarkable_type,
            reminder_at: None,
            auto_delete_preference,
            name: None,
            selected_datetime: None,
        }
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// True when this bookmark points at the given content item.
    pub fn targets(&self, bookmarkable_type: BookmarkableType, bookmarkable_id: i64) -> bool {
        self.bookmarkable_type == bookmarkable_type && self.bookmarkable_id == bookmarkable_id
    }
}
