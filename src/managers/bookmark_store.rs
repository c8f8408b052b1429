//! Local bookmark store.
//!
//! Implements [`BookmarkPersistence`] on top of SQLite via `rusqlite`, with
//! the same validation the forum applies: one bookmark per bookmarkable item
//! and names of at most 100 characters.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tracing::{debug, info, warn};

use crate::database::Database;
use crate::services::bookmark_form_data::{format_reminder_at, SaveData};
use crate::services::persistence::{BookmarkPersistence, CreatedBookmark, DeletedBookmark};
use crate::types::bookmark::{AutoDeletePreference, Bookmark, BookmarkableType};
use crate::types::errors::PersistenceError;

/// Longest bookmark name accepted.
pub const MAX_NAME_LENGTH: usize = 100;

const UNPROCESSABLE: u16 = 422;

const SELECT_BOOKMARK: &str = "SELECT id, bookmarkable_id, bookmarkable_type, reminder_at, \
     auto_delete_preference, name FROM bookmarks";

/// Bookmark store backed by a SQLite database.
pub struct SqliteBookmarkStore {
    db: Mutex<Database>,
}

impl SqliteBookmarkStore {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records which topic a post belongs to.
    pub fn register_post(&self, post_id: i64, topic_id: i64) -> Result<(), PersistenceError> {
        self.db().connection().execute(
            "INSERT INTO posts (id, topic_id) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET topic_id = excluded.topic_id",
            params![post_id, topic_id],
        )?;
        Ok(())
    }

    pub fn topic_for_post(&self, post_id: i64) -> Result<Option<i64>, PersistenceError> {
        let topic = self
            .db()
            .connection()
            .query_row(
                "SELECT topic_id FROM posts WHERE id = ?1",
                params![post_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(topic)
    }

    pub fn get(&self, id: i64) -> Result<Option<Bookmark>, PersistenceError> {
        let db = self.db();
        let bookmark = db
            .connection()
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_BOOKMARK),
                params![id],
                row_to_bookmark,
            )
            .optional()?;
        Ok(bookmark)
    }

    pub fn find_for(
        &self,
        bookmarkable_type: BookmarkableType,
        bookmarkable_id: i64,
    ) -> Result<Option<Bookmark>, PersistenceError> {
        let db = self.db();
        Ok(find_bookmark(db.connection(), bookmarkable_type, bookmarkable_id)?)
    }

    /// The topic's own bookmark plus bookmarks on any of its registered posts.
    pub fn list_for_topic(&self, topic_id: i64) -> Result<Vec<Bookmark>, PersistenceError> {
        let db = self.db();
        let mut stmt = db.connection().prepare(&format!(
            "{} WHERE (bookmarkable_type = 'Topic' AND bookmarkable_id = ?1)
                OR (bookmarkable_type = 'Post'
                    AND bookmarkable_id IN (SELECT id FROM posts WHERE topic_id = ?1))
             ORDER BY id",
            SELECT_BOOKMARK
        ))?;
        let rows = stmt.query_map(params![topic_id], row_to_bookmark)?;
        let bookmarks = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(bookmarks)
    }

    /// Bookmarks whose reminder is due at or before `now`.
    pub fn due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<Bookmark>, PersistenceError> {
        let db = self.db();
        let mut stmt = db.connection().prepare(&format!(
            "{} WHERE reminder_at IS NOT NULL AND reminder_at <= ?1 ORDER BY reminder_at",
            SELECT_BOOKMARK
        ))?;
        let rows = stmt.query_map(params![format_reminder_at(now)], row_to_bookmark)?;
        let bookmarks = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(bookmarks)
    }

    pub fn topic_bookmarked(&self, topic_id: i64) -> Result<bool, PersistenceError> {
        Ok(!self.list_for_topic(topic_id)?.is_empty())
    }

    /// Inserts a new row. The duplicate check and the insert run under one
    /// connection guard.
    fn insert(&self, payload: &SaveData) -> Result<CreatedBookmark, PersistenceError> {
        validate(payload)?;
        let db = self.db();
        if find_bookmark(db.connection(), payload.bookmarkable_type, payload.bookmarkable_id)?
            .is_some()
        {
            return Err(already_bookmarked(payload.bookmarkable_type));
        }

        let now = Utc::now().timestamp();
        db.connection()
            .execute(
                "INSERT INTO bookmarks (bookmarkable_id, bookmarkable_type, name, reminder_at,
                     auto_delete_preference, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    payload.bookmarkable_id,
                    payload.bookmarkable_type.as_str(),
                    payload.name,
                    stored_reminder(payload),
                    payload.auto_delete_preference.code(),
                    now
                ],
            )
            .map_err(|e| duplicate_as_rejection(e, payload.bookmarkable_type))?;
        let id = db.connection().last_insert_rowid();
        info!(bookmark_id = id, bookmarkable_id = payload.bookmarkable_id, "bookmark stored");
        Ok(CreatedBookmark { id })
    }

    fn update_row(&self, id: i64, payload: &SaveData) -> Result<(), PersistenceError> {
        validate(payload)?;
        let affected = self.db().connection().execute(
            "UPDATE bookmarks SET name = ?1, reminder_at = ?2, auto_delete_preference = ?3,
                 updated_at = ?4
             WHERE id = ?5",
            params![
                payload.name,
                stored_reminder(payload),
                payload.auto_delete_preference.code(),
                Utc::now().timestamp(),
                id
            ],
        )?;
        if affected == 0 {
            return Err(PersistenceError::NotFound(id));
        }
        debug!(bookmark_id = id, "bookmark row updated");
        Ok(())
    }

    fn delete_row(&self, id: i64) -> Result<DeletedBookmark, PersistenceError> {
        let bookmark = self.get(id)?.ok_or(PersistenceError::NotFound(id))?;
        self.db()
            .connection()
            .execute("DELETE FROM bookmarks WHERE id = ?1", params![id])?;

        let topic_id = match bookmark.bookmarkable_type {
            BookmarkableType::Topic => Some(bookmark.bookmarkable_id),
            BookmarkableType::Post => self.topic_for_post(bookmark.bookmarkable_id)?,
        };
        let topic_bookmarked = match topic_id {
            Some(topic_id) => self.topic_bookmarked(topic_id)?,
            None => false,
        };
        info!(bookmark_id = id, topic_bookmarked, "bookmark row deleted");
        Ok(DeletedBookmark { topic_bookmarked })
    }
}

fn rejected(message: String) -> PersistenceError {
    PersistenceError::Rejected {
        status: UNPROCESSABLE,
        errors: vec![message],
    }
}

fn already_bookmarked(bookmarkable_type: BookmarkableType) -> PersistenceError {
    rejected(format!(
        "You have already bookmarked this {}",
        bookmarkable_type.as_str().to_lowercase()
    ))
}

/// A UNIQUE violation on insert means another writer got there first.
fn duplicate_as_rejection(e: rusqlite::Error, bookmarkable_type: BookmarkableType) -> PersistenceError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
            warn!(%e, "bookmark insert hit the uniqueness constraint");
            already_bookmarked(bookmarkable_type)
        }
        _ => e.into(),
    }
}

fn find_bookmark(
    conn: &Connection,
    bookmarkable_type: BookmarkableType,
    bookmarkable_id: i64,
) -> rusqlite::Result<Option<Bookmark>> {
    conn.query_row(
        &format!(
            "{} WHERE bookmarkable_type = ?1 AND bookmarkable_id = ?2",
            SELECT_BOOKMARK
        ),
        params![bookmarkable_type.as_str(), bookmarkable_id],
        row_to_bookmark,
    )
    .optional()
}

fn validate(payload: &SaveData) -> Result<(), PersistenceError> {
    if let Some(name) = &payload.name {
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(rejected(format!(
                "Name is too long (maximum is {} characters)",
                MAX_NAME_LENGTH
            )));
        }
    }
    Ok(())
}

/// Normalized reminder text; unparseable input is stored as no reminder.
fn stored_reminder(payload: &SaveData) -> Option<String> {
    payload.reminder_instant().map(format_reminder_at)
}

fn conversion_error(column: usize, kind: Type, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, kind, message.into())
}

/// Maps a `bookmarks` row. Columns the store cannot interpret fail the read
/// rather than being dropped.
fn row_to_bookmark(row: &rusqlite::Row) -> rusqlite::Result<Bookmark> {
    let id: i64 = row.get(0)?;
    let kind: String = row.get(2)?;
    let bookmarkable_type = kind
        .parse::<BookmarkableType>()
        .map_err(|e| conversion_error(2, Type::Text, e))?;
    let reminder_at = match row.get::<_, Option<String>>(3)? {
        Some(raw) => {
            let parsed = DateTime::parse_from_rfc3339(&raw).map_err(|e| {
                warn!(bookmark_id = id, reminder_at = %raw, "unreadable reminder in store");
                conversion_error(3, Type::Text, format!("invalid reminder_at {:?}: {}", raw, e))
            })?;
            Some(parsed.with_timezone(&Utc))
        }
        None => None,
    };
    let code: i64 = row.get(4)?;
    let auto_delete_preference = u8::try_from(code)
        .ok()
        .and_then(AutoDeletePreference::from_code)
        .ok_or_else(|| {
            warn!(bookmark_id = id, code, "unknown auto delete preference in store");
            conversion_error(4, Type::Integer, format!("unknown auto delete preference: {}", code))
        })?;
    Ok(Bookmark {
        id: Some(id),
        bookmarkable_id: row.get(1)?,
        bookmarkable_type,
        reminder_at,
        auto_delete_preference,
        name: row.get(5)?,
        selected_datetime: None,
    })
}

#[async_trait]
impl BookmarkPersistence for SqliteBookmarkStore {
    async fn create(&self, payload: &SaveData) -> Result<CreatedBookmark, PersistenceError> {
        self.insert(payload)
    }

    async fn update(&self, id: i64, payload: &SaveData) -> Result<(), PersistenceError> {
        self.update_row(id, payload)
    }

    async fn delete(&self, id: i64) -> Result<DeletedBookmark, PersistenceError> {
        self.delete_row(id)
    }
}
