//! App core for the bookmark modal host.
//!
//! Holds settings, strings, the persistence backend and every open modal
//! session. All state sits behind its own lock so RPC requests can run
//! concurrently; no lock is held across an `.await`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};
use uuid::Uuid;

use crate::database::Database;
use crate::managers::bookmark_store::SqliteBookmarkStore;
use crate::managers::host_bridge::{HostBridge, HostEvent, RecordingEvents, TopicBookmarks};
use crate::managers::modal_controller::ModalController;
use crate::services::http_persistence::HttpBookmarkPersistence;
use crate::services::localization_engine::{LocalizationEngine, LocalizationEngineTrait};
use crate::services::persistence::BookmarkPersistence;
use crate::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use crate::types::bookmark::{Bookmark, BookmarkableType};
use crate::types::errors::PersistenceError;

/// Environment variable carrying the forum API key for the HTTP backend.
pub const API_KEY_ENV: &str = "BOOKMARK_MODAL_API_KEY";

/// Where bookmarks are persisted.
pub enum Backend {
    /// Local SQLite store.
    Local(Arc<SqliteBookmarkStore>),
    /// Forum HTTP API.
    Remote(Arc<HttpBookmarkPersistence>),
}

impl Backend {
    fn persistence(&self) -> Arc<dyn BookmarkPersistence> {
        match self {
            Backend::Local(store) => store.clone() as Arc<dyn BookmarkPersistence>,
            Backend::Remote(http) => http.clone() as Arc<dyn BookmarkPersistence>,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Local(_) => "sqlite",
            Backend::Remote(_) => "http",
        }
    }
}

/// One open modal and the page state it reports into.
#[derive(Clone)]
pub struct OpenModal {
    pub controller: Arc<ModalController>,
    pub bridge: HostBridge,
    pub topic_id: i64,
    /// Host events raised by this session only.
    events: Arc<RecordingEvents>,
}

impl OpenModal {
    /// Host events emitted by this session since the previous call.
    pub fn take_events(&self) -> Vec<HostEvent> {
        self.events.drain()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct App {
    pub settings_engine: Mutex<SettingsEngine>,
    pub localization_engine: Mutex<LocalizationEngine>,
    backend: Backend,
    /// Page state per topic, kept while the topic has open sessions.
    topics: Mutex<HashMap<i64, Arc<Mutex<TopicBookmarks>>>>,
    sessions: Mutex<HashMap<Uuid, OpenModal>>,
}

impl App {
    pub fn new(
        settings_engine: SettingsEngine,
        localization_engine: LocalizationEngine,
        backend: Backend,
    ) -> Self {
        Self {
            settings_engine: Mutex::new(settings_engine),
            localization_engine: Mutex::new(localization_engine),
            backend,
            topics: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Startup path for the RPC binary: loads settings, picks the HTTP
    /// backend when `api.base_url` is set and the SQLite store otherwise.
    pub fn from_settings(
        config_path: Option<String>,
        db_path: Option<PathBuf>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut settings_engine = SettingsEngine::new(config_path);
        settings_engine.load()?;

        let mut localization_engine = LocalizationEngine::new("locales");
        if localization_engine.initialize().is_err() {
            localization_engine = LocalizationEngine::builtin();
        }
        let language = settings_engine.get_settings().locale.language.clone();
        if localization_engine.set_locale(&language).is_err() {
            let detected = localization_engine.detect_system_locale();
            let _ = localization_engine.set_locale(&detected);
        }

        let backend = match settings_engine.get_settings().api.base_url.clone() {
            Some(base_url) => {
                let mut http = HttpBookmarkPersistence::new(&base_url, settings_engine.api_timeout())?;
                if let Ok(key) = std::env::var(API_KEY_ENV) {
                    http = http.with_api_key(key);
                }
                Backend::Remote(Arc::new(http))
            }
            None => {
                let path = db_path.unwrap_or_else(Database::default_path);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                Backend::Local(Arc::new(SqliteBookmarkStore::new(Database::open(&path)?)))
            }
        };
        info!(backend = backend.name(), locale = localization_engine.get_locale(), "app initialized");

        Ok(Self::new(settings_engine, localization_engine, backend))
    }

    /// App backed by an in-memory store, with settings kept at `config_path`.
    pub fn in_memory(config_path: String) -> Result<Self, PersistenceError> {
        let store = SqliteBookmarkStore::open_in_memory()?;
        Ok(Self::new(
            SettingsEngine::new(Some(config_path)),
            LocalizationEngine::builtin(),
            Backend::Local(Arc::new(store)),
        ))
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn local_store(&self) -> Option<&Arc<SqliteBookmarkStore>> {
        match &self.backend {
            Backend::Local(store) => Some(store),
            Backend::Remote(_) => None,
        }
    }

    fn load_topic(&self, topic_id: i64) -> Result<TopicBookmarks, PersistenceError> {
        let bookmarks = match self.local_store() {
            Some(store) => store.list_for_topic(topic_id)?,
            None => Vec::new(),
        };
        Ok(TopicBookmarks::with_bookmarks(topic_id, bookmarks))
    }

    /// Shared page state for `topic_id`, loaded from the local store when
    /// the topic is not tracked yet.
    fn topic_state(&self, topic_id: i64) -> Result<Arc<Mutex<TopicBookmarks>>, PersistenceError> {
        if let Some(topic) = lock(&self.topics).get(&topic_id) {
            return Ok(Arc::clone(topic));
        }
        let loaded = Arc::new(Mutex::new(self.load_topic(topic_id)?));
        Ok(Arc::clone(lock(&self.topics).entry(topic_id).or_insert(loaded)))
    }

    /// Snapshot of the page state for `topic_id`.
    pub fn topic(&self, topic_id: i64) -> Result<TopicBookmarks, PersistenceError> {
        let tracked = lock(&self.topics).get(&topic_id).cloned();
        match tracked {
            Some(topic) => Ok(lock(&topic).clone()),
            None => self.load_topic(topic_id),
        }
    }

    /// Replaces the page state for `topic_id` with bookmarks the host
    /// already has, e.g. ones fetched from the forum.
    pub fn seed_topic(&self, topic_id: i64, bookmarks: Vec<Bookmark>) {
        let seeded = TopicBookmarks::with_bookmarks(topic_id, bookmarks);
        let mut topics = lock(&self.topics);
        match topics.get(&topic_id) {
            Some(topic) => *lock(topic) = seeded,
            None => {
                topics.insert(topic_id, Arc::new(Mutex::new(seeded)));
            }
        }
        debug!(topic_id, "topic bookmarks seeded");
    }

    /// Number of topics whose page state is held in memory.
    pub fn tracked_topic_count(&self) -> usize {
        lock(&self.topics).len()
    }

    /// Opens a modal for a post or topic and returns its session handle.
    ///
    /// `existing` is the host's copy of the bookmark being edited; it is
    /// recorded in the topic state before the session looks it up.
    pub fn open_modal(
        &self,
        bookmarkable_type: BookmarkableType,
        bookmarkable_id: i64,
        topic_id: i64,
        existing: Option<Bookmark>,
    ) -> Result<(Uuid, Arc<ModalController>), PersistenceError> {
        if let Some(bookmark) = &existing {
            if !bookmark.targets(bookmarkable_type, bookmarkable_id) {
                return Err(PersistenceError::Message(format!(
                    "bookmark does not belong to {} {}",
                    bookmarkable_type, bookmarkable_id
                )));
            }
        }
        if let (Some(store), BookmarkableType::Post) = (self.local_store(), bookmarkable_type) {
            store.register_post(bookmarkable_id, topic_id)?;
        }
        let events = Arc::new(RecordingEvents::new());
        let bridge = HostBridge::shared(self.topic_state(topic_id)?, events.clone());
        if let Some(bookmark) = existing {
            bridge.remember(bookmark);
        }

        let (options, default_pref) = {
            let settings = lock(&self.settings_engine);
            (
                settings.modal_options(),
                settings.get_settings().user.bookmark_auto_delete_preference,
            )
        };
        let bookmark = bridge.find_or_create(bookmarkable_type, bookmarkable_id, default_pref);
        let callbacks = bridge.callbacks_for_bookmarkable(bookmarkable_type, bookmarkable_id);
        let controller = Arc::new(ModalController::open(
            bookmark,
            options,
            self.backend.persistence(),
            callbacks,
        ));

        let id = Uuid::new_v4();
        lock(&self.sessions).insert(
            id,
            OpenModal {
                controller: controller.clone(),
                bridge,
                topic_id,
                events,
            },
        );
        info!(session = %id, bookmarkable_id, topic_id, "modal session opened");
        Ok((id, controller))
    }

    pub fn session(&self, id: &Uuid) -> Option<OpenModal> {
        lock(&self.sessions).get(id).cloned()
    }

    /// Drops a closed session after letting its bridge react to the close.
    /// The topic's page state goes with the last session on it.
    pub fn finish_session(&self, id: &Uuid) -> bool {
        let Some(open) = lock(&self.sessions).remove(id) else {
            return false;
        };
        if let Some(result) = open.controller.close_result() {
            open.bridge.handle_close(&result);
        }
        let sessions = lock(&self.sessions);
        if !sessions.values().any(|s| s.topic_id == open.topic_id)
            && lock(&self.topics).remove(&open.topic_id).is_some()
        {
            debug!(topic_id = open.topic_id, "topic state released");
        }
        true
    }

    pub fn open_session_count(&self) -> usize {
        lock(&self.sessions).len()
    }
}
