//! Bookmark persistence contract.
//!
//! The modal core only talks to storage through [`BookmarkPersistence`].
//! Implementations live in `http_persistence` (remote API), the SQLite
//! `bookmark_store`, and `mock_persistence` for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::services::bookmark_form_data::SaveData;
use crate::types::errors::PersistenceError;

/// Response to a successful create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedBookmark {
    pub id: i64,
}

/// Response to a successful delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeletedBookmark {
    /// Whether the topic still carries a bookmark after the delete.
    #[serde(default)]
    pub topic_bookmarked: bool,
}

/// Storage operations a modal session may issue.
///
/// Every call runs to completion; there is no cancellation.
#[async_trait]
pub trait BookmarkPersistence: Send + Sync {
    async fn create(&self, payload: &SaveData) -> Result<CreatedBookmark, PersistenceError>;

    async fn update(&self, id: i64, payload: &SaveData) -> Result<(), PersistenceError>;

    async fn delete(&self, id: i64) -> Result<DeletedBookmark, PersistenceError>;
}
