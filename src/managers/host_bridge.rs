//! Host bookkeeping around the bookmark modal.
//!
//! The bridge owns the page-side view of a topic's bookmarks. It builds the
//! callbacks a modal session runs after save/delete and turns close payloads
//! into host events. It never decides anything on its own.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::debug;

use crate::managers::modal_controller::BookmarkCallbacks;
use crate::services::bookmark_form_data::SaveData;
use crate::types::bookmark::{AutoDeletePreference, Bookmark, BookmarkableType};
use crate::types::modal::CloseResult;

/// Something the page has to react to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    /// Re-render the post's bookmark state (`post-stream:refresh`).
    RefreshRequested { bookmarkable_id: i64 },
    BookmarkSaved {
        bookmarkable_id: i64,
        bookmark_id: Option<i64>,
    },
    BookmarkRemoved {
        bookmarkable_id: i64,
        bookmark_id: i64,
        topic_bookmarked: bool,
    },
}

impl HostEvent {
    /// Name of the app event the page listens for.
    pub fn name(&self) -> &'static str {
        match self {
            HostEvent::RefreshRequested { .. } => "post-stream:refresh",
            HostEvent::BookmarkSaved { .. } => "bookmarks:changed",
            HostEvent::BookmarkRemoved { .. } => "bookmarks:changed",
        }
    }
}

/// Sink for host events.
pub trait HostEvents: Send + Sync {
    fn emit(&self, event: HostEvent);
}

/// Keeps every emitted event until drained.
#[derive(Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<HostEvent>>,
}

impl RecordingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<HostEvent> {
        lock(&self.events).clone()
    }

    /// Returns and clears the recorded events.
    pub fn drain(&self) -> Vec<HostEvent> {
        std::mem::take(&mut *lock(&self.events))
    }
}

impl HostEvents for RecordingEvents {
    fn emit(&self, event: HostEvent) {
        lock(&self.events).push(event);
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bookmark fields a rendered post carries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PostBookmarkState {
    pub bookmarked: bool,
    pub bookmark_id: Option<i64>,
    pub bookmark_name: Option<String>,
    pub bookmark_reminder_at: Option<String>,
    pub bookmark_auto_delete_preference: Option<AutoDeletePreference>,
}

/// A topic's bookmarks as the page knows them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TopicBookmarks {
    pub topic_id: i64,
    /// Whether the topic shows the bookmarked indicator.
    pub bookmarked: bool,
    pub bookmarks: Vec<Bookmark>,
    pub posts: HashMap<i64, PostBookmarkState>,
}

impl TopicBookmarks {
    pub fn new(topic_id: i64) -> Self {
        Self {
            topic_id,
            ..Self::default()
        }
    }

    /// Seeds the page state from bookmarks loaded elsewhere.
    pub fn with_bookmarks(topic_id: i64, bookmarks: Vec<Bookmark>) -> Self {
        let mut topic = Self::new(topic_id);
        for bookmark in &bookmarks {
            if bookmark.bookmarkable_type == BookmarkableType::Post {
                topic
                    .posts
                    .insert(bookmark.bookmarkable_id, post_state_for(bookmark));
            }
        }
        topic.bookmarked = !bookmarks.is_empty();
        topic.bookmarks = bookmarks;
        topic
    }

    fn upsert(&mut self, bookmark: Bookmark) {
        let existing = self.bookmarks.iter_mut().find(|b| {
            (b.id.is_some() && b.id == bookmark.id)
                || b.targets(bookmark.bookmarkable_type, bookmark.bookmarkable_id)
        });
        match existing {
            Some(slot) => *slot = bookmark,
            None => self.bookmarks.push(bookmark),
        }
    }

    fn remove(&mut self, bookmark_id: i64) -> Option<Bookmark> {
        let index = self.bookmarks.iter().position(|b| b.id == Some(bookmark_id))?;
        Some(self.bookmarks.remove(index))
    }
}

fn post_state_for(bookmark: &Bookmark) -> PostBookmarkState {
    PostBookmarkState {
        bookmarked: true,
        bookmark_id: bookmark.id,
        bookmark_name: bookmark.name.clone(),
        bookmark_reminder_at: bookmark
            .reminder_at
            .map(crate::services::bookmark_form_data::format_reminder_at),
        bookmark_auto_delete_preference: Some(bookmark.auto_delete_preference),
    }
}

/// Connects modal sessions for one topic to the page.
#[derive(Clone)]
pub struct HostBridge {
    topic: Arc<Mutex<TopicBookmarks>>,
    events: Arc<dyn HostEvents>,
}

impl HostBridge {
    pub fn new(topic: TopicBookmarks, events: Arc<dyn HostEvents>) -> Self {
        Self::shared(Arc::new(Mutex::new(topic)), events)
    }

    /// Bridge over page state that other sessions on the same topic also
    /// use. Events go to `events` only.
    pub fn shared(topic: Arc<Mutex<TopicBookmarks>>, events: Arc<dyn HostEvents>) -> Self {
        Self { topic, events }
    }

    /// Records a bookmark the host already knows about, replacing any entry
    /// for the same target.
    pub fn remember(&self, bookmark: Bookmark) {
        let mut topic = lock(&self.topic);
        if bookmark.bookmarkable_type == BookmarkableType::Post {
            topic
                .posts
                .insert(bookmark.bookmarkable_id, post_state_for(&bookmark));
        }
        topic.bookmarked = true;
        topic.upsert(bookmark);
    }

    pub fn topic(&self) -> TopicBookmarks {
        lock(&self.topic).clone()
    }

    pub fn topic_id(&self) -> i64 {
        lock(&self.topic).topic_id
    }

    /// The post's existing bookmark, or a fresh one carrying the user's
    /// default auto-delete preference.
    pub fn find_or_create_for_post(&self, post_id: i64, default_pref: AutoDeletePreference) -> Bookmark {
        self.find_or_create(BookmarkableType::Post, post_id, default_pref)
    }

    pub fn find_or_create(
        &self,
        bookmarkable_type: BookmarkableType,
        bookmarkable_id: i64,
        default_pref: AutoDeletePreference,
    ) -> Bookmark {
        lock(&self.topic)
            .bookmarks
            .iter()
            .find(|b| b.targets(bookmarkable_type, bookmarkable_id))
            .cloned()
            .unwrap_or_else(|| Bookmark::create_for(bookmarkable_type, bookmarkable_id, default_pref))
    }

    /// Callbacks that keep the topic's bookmark list in step with the server.
    pub fn callbacks_for(&self, post_id: i64) -> BookmarkCallbacks {
        self.callbacks_for_bookmarkable(BookmarkableType::Post, post_id)
    }

    /// Same as [`callbacks_for`](Self::callbacks_for) for any bookmarkable.
    /// Only post bookmarks touch the per-post display state.
    pub fn callbacks_for_bookmarkable(
        &self,
        bookmarkable_type: BookmarkableType,
        bookmarkable_id: i64,
    ) -> BookmarkCallbacks {
        let is_post = bookmarkable_type == BookmarkableType::Post;
        let save_topic = Arc::clone(&self.topic);
        let save_events = Arc::clone(&self.events);
        let delete_topic = Arc::clone(&self.topic);
        let delete_events = Arc::clone(&self.events);

        BookmarkCallbacks::new()
            .on_save(move |saved: &SaveData| {
                let bookmark = saved.to_bookmark();
                {
                    let mut topic = lock(&save_topic);
                    if is_post {
                        topic.posts.insert(bookmarkable_id, post_state_for(&bookmark));
                    }
                    topic.bookmarked = true;
                    topic.upsert(bookmark);
                }
                debug!(bookmarkable_id, bookmark_id = ?saved.id, "bookmark saved on page");
                save_events.emit(HostEvent::BookmarkSaved {
                    bookmarkable_id,
                    bookmark_id: saved.id,
                });
            })
            .on_delete(move |topic_bookmarked, bookmark_id| {
                {
                    let mut topic = lock(&delete_topic);
                    let _ = topic.remove(bookmark_id);
                    if is_post {
                        topic.posts.insert(bookmarkable_id, PostBookmarkState::default());
                    }
                    topic.bookmarked = topic_bookmarked;
                }
                debug!(bookmarkable_id, bookmark_id, topic_bookmarked, "bookmark removed from page");
                delete_events.emit(HostEvent::BookmarkRemoved {
                    bookmarkable_id,
                    bookmark_id,
                    topic_bookmarked,
                });
            })
    }

    /// Emits a refresh for the closed post when the close payload asks for one.
    pub fn handle_close(&self, result: &CloseResult) -> bool {
        if result.refresh_requested {
            self.events.emit(HostEvent::RefreshRequested {
                bookmarkable_id: result.bookmarkable_id,
            });
        }
        result.refresh_requested
    }
}
