//! Bookmark modal controller.
//!
//! Owns one modal session: the working copy of the bookmark, the editor's
//! reminder fields and the save/delete/close state machine. Every action
//! takes `&self`, so two triggers may overlap (a Save press racing a click
//! outside the modal). Session state lives behind a mutex that is never held
//! across an `.await`; the only suspension point is the persistence call.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::services::bookmark_form_data::{BookmarkFormData, SaveData};
use crate::services::localization_engine::Translate;
use crate::services::persistence::BookmarkPersistence;
use crate::services::reminder_time::{
    default_reminder_time, local_datetime_to_utc, parse_timezone, today_in, ReminderTimeResolver,
};
use crate::services::sanitize::sanitize;
use crate::types::bookmark::{AutoDeletePreference, Bookmark};
use crate::types::errors::PersistenceError;
use crate::types::modal::{ActionOutcome, CloseResult, CloseTrigger, ModalSession, ModalState};

/// Per-user context the modal needs from the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModalOptions {
    /// IANA timezone name from the user's profile.
    pub user_timezone: Option<String>,
    pub is_mobile_device: bool,
}

pub type AfterSave = Arc<dyn Fn(&SaveData) + Send + Sync>;
/// Receives `(topic_bookmarked, bookmark_id)`.
pub type AfterDelete = Arc<dyn Fn(bool, i64) + Send + Sync>;

/// Host hooks run after a successful save or delete.
#[derive(Clone, Default)]
pub struct BookmarkCallbacks {
    pub after_save: Option<AfterSave>,
    pub after_delete: Option<AfterDelete>,
}

impl BookmarkCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_save(mut self, f: impl Fn(&SaveData) + Send + Sync + 'static) -> Self {
        self.after_save = Some(Arc::new(f));
        self
    }

    pub fn on_delete(mut self, f: impl Fn(bool, i64) + Send + Sync + 'static) -> Self {
        self.after_delete = Some(Arc::new(f));
        self
    }
}

/// One entry of the auto-delete dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutoDeleteOption {
    pub id: u8,
    pub name: String,
    pub preference: AutoDeletePreference,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct ModalController {
    persistence: Arc<dyn BookmarkPersistence>,
    callbacks: BookmarkCallbacks,
    options: ModalOptions,
    tz: Tz,
    bookmarkable_id: i64,
    // Lock order: `session` before `form`.
    session: Mutex<ModalSession>,
    form: Mutex<BookmarkFormData>,
    /// Woken whenever an in-flight save or delete resolves.
    settled: Notify,
}

impl std::fmt::Debug for ModalController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModalController")
            .field("bookmarkable_id", &self.bookmarkable_id)
            .finish_non_exhaustive()
    }
}

impl ModalController {
    /// Opens a session for `bookmark`, prefilling the reminder fields from
    /// its stored reminder in the user's timezone.
    pub fn open(
        bookmark: Bookmark,
        options: ModalOptions,
        persistence: Arc<dyn BookmarkPersistence>,
        callbacks: BookmarkCallbacks,
    ) -> Self {
        let tz = parse_timezone(options.user_timezone.as_deref());
        let mut session = ModalSession::new(!bookmark.is_new());
        if let Some(resolved) = ReminderTimeResolver::resolve_in(&bookmark, tz) {
            session.reminder_date = Some(resolved.date);
            session.reminder_time = Some(resolved.time);
            session.prefilled_datetime = Some(resolved.at);
        }
        debug!(
            bookmarkable_id = bookmark.bookmarkable_id,
            bookmark_id = ?bookmark.id,
            prefilled = session.prefilled_datetime.is_some(),
            "bookmark modal opened"
        );
        Self {
            persistence,
            callbacks,
            options,
            tz,
            bookmarkable_id: bookmark.bookmarkable_id,
            session: Mutex::new(session),
            form: Mutex::new(BookmarkFormData::wrap(bookmark)),
            settled: Notify::new(),
        }
    }

    // ─── Lifecycle actions ───

    /// Persists the bookmark and closes the modal.
    ///
    /// Ignored while another save or delete is outstanding. On failure the
    /// modal stays open with the sanitized error in the flash.
    pub async fn save_and_close(&self) -> ActionOutcome {
        {
            let mut session = lock(&self.session);
            if session.is_closed() || session.is_busy() {
                debug!(bookmarkable_id = self.bookmarkable_id, "save ignored, modal busy or closed");
                return ActionOutcome::Ignored;
            }
            session.flash = None;
            session.state = ModalState::SavingManual;
            session.saving = true;
            session.saving_manually = true;
        }

        let outcome = match self.persist().await {
            Ok(saved) => {
                self.fire_after_save(&saved);
                let mut session = lock(&self.session);
                session.saving = false;
                session.saving_manually = false;
                self.close_session(&mut session, false, CloseTrigger::Programmatic)
            }
            Err(err) => {
                let flash = self.flash_for(&err);
                let mut session = lock(&self.session);
                session.saving = false;
                session.saving_manually = false;
                session.flash = Some(flash.clone());
                match session.close_result.clone() {
                    Some(result) => ActionOutcome::Closed(result),
                    None => {
                        session.state = ModalState::Editing;
                        ActionOutcome::StayedOpen { flash: Some(flash) }
                    }
                }
            }
        };
        self.settled.notify_waiters();
        outcome
    }

    /// Closes the modal without persisting anything. The discard sticks for
    /// the rest of the session.
    pub fn close_without_saving(&self) -> ActionOutcome {
        let outcome = {
            let mut session = lock(&self.session);
            if session.is_closed() {
                return ActionOutcome::Ignored;
            }
            session.close_without_saving = true;
            session.state = ModalState::ClosingWithoutSaving;
            self.close_session(&mut session, true, CloseTrigger::Programmatic)
        };
        self.settled.notify_waiters();
        outcome
    }

    /// Handles the modal being dismissed by `trigger`.
    ///
    /// A click outside auto-saves unless the user discarded, and closes even
    /// when that save fails. If a save or delete is already in flight it
    /// waits for it instead of issuing a second call.
    pub async fn closing_modal(&self, trigger: CloseTrigger) -> ActionOutcome {
        if trigger != CloseTrigger::OutsideClick {
            let mut session = lock(&self.session);
            if session.is_closed() {
                return ActionOutcome::Ignored;
            }
            return self.close_session(&mut session, false, trigger);
        }

        let mut waited = false;
        loop {
            let notified = self.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut session = lock(&self.session);
                if let Some(result) = &session.close_result {
                    return if waited {
                        ActionOutcome::Closed(result.clone())
                    } else {
                        ActionOutcome::Ignored
                    };
                }
                if !session.is_busy() {
                    if waited || session.close_without_saving {
                        return self.close_session(&mut session, false, trigger);
                    }
                    session.state = ModalState::SavingAuto;
                    session.saving = true;
                    break;
                }
            }

            debug!(
                bookmarkable_id = self.bookmarkable_id,
                "outside click waiting for pending bookmark call"
            );
            waited = true;
            notified.await;
        }

        let saved = self.persist().await;
        if let Ok(saved) = &saved {
            self.fire_after_save(saved);
        }
        let outcome = {
            let mut session = lock(&self.session);
            session.saving = false;
            if let Err(err) = &saved {
                session.flash = Some(self.flash_for(err));
            }
            self.close_session(&mut session, false, trigger)
        };
        self.settled.notify_waiters();
        outcome
    }

    /// Deletes the persisted bookmark and closes the modal. A bookmark that
    /// was never saved closes as a discard without a call.
    pub async fn delete_bookmark(&self) -> ActionOutcome {
        let id = {
            let mut session = lock(&self.session);
            if session.is_closed() || session.is_busy() {
                return ActionOutcome::Ignored;
            }
            let id = lock(&self.form).bookmark().id;
            match id {
                Some(id) => {
                    session.flash = None;
                    session.state = ModalState::Deleting;
                    session.deleting = true;
                    id
                }
                None => return self.close_session(&mut session, true, CloseTrigger::Programmatic),
            }
        };

        let outcome = match self.persistence.delete(id).await {
            Ok(deleted) => {
                info!(bookmark_id = id, topic_bookmarked = deleted.topic_bookmarked, "bookmark deleted");
                if let Some(after_delete) = &self.callbacks.after_delete {
                    after_delete(deleted.topic_bookmarked, id);
                }
                let mut session = lock(&self.session);
                session.deleting = false;
                self.close_session(&mut session, false, CloseTrigger::Programmatic)
            }
            Err(err) => {
                let flash = self.flash_for(&err);
                let mut session = lock(&self.session);
                session.deleting = false;
                session.flash = Some(flash.clone());
                match session.close_result.clone() {
                    Some(result) => ActionOutcome::Closed(result),
                    None => {
                        session.state = ModalState::Editing;
                        ActionOutcome::StayedOpen { flash: Some(flash) }
                    }
                }
            }
        };
        self.settled.notify_waiters();
        outcome
    }

    // ─── Edits ───

    pub fn set_name(&self, name: Option<String>) -> bool {
        self.edit(|_, form| {
            form.bookmark_mut().name = name.filter(|n| !n.is_empty());
        })
    }

    pub fn set_auto_delete_preference(&self, preference: AutoDeletePreference) -> bool {
        self.edit(|_, form| form.bookmark_mut().auto_delete_preference = preference)
    }

    pub fn toggle_options(&self) -> bool {
        self.edit(|session, _| session.show_options = !session.show_options)
    }

    /// Sets the reminder date. `None` clears the reminder entirely.
    pub fn change_selected_date(&self, date: Option<NaiveDate>) -> bool {
        let tz = self.tz;
        self.edit(|session, form| {
            session.reminder_date = date;
            match date {
                Some(date) => {
                    let time = session.reminder_time.unwrap_or_else(default_reminder_time);
                    form.bookmark_mut().selected_datetime = Some(local_datetime_to_utc(date, time, tz));
                }
                None => form.clear_reminder(),
            }
        })
    }

    /// Sets the reminder time of day; only takes effect once a date is picked.
    pub fn change_selected_time(&self, time: Option<NaiveTime>) -> bool {
        let tz = self.tz;
        self.edit(|session, form| {
            session.reminder_time = time;
            if let Some(date) = session.reminder_date {
                let time = time.unwrap_or_else(default_reminder_time);
                form.bookmark_mut().selected_datetime = Some(local_datetime_to_utc(date, time, tz));
            }
        })
    }

    // ─── Presentation ───

    pub fn modal_title_key(&self) -> &'static str {
        if self.editing_existing_bookmark() {
            "bookmarks.edit"
        } else {
            "bookmarks.create"
        }
    }

    pub fn modal_title(&self, i18n: &dyn Translate) -> String {
        i18n.t(self.modal_title_key())
    }

    pub fn auto_delete_options(&self, i18n: &dyn Translate) -> Vec<AutoDeleteOption> {
        AutoDeletePreference::ALL
            .into_iter()
            .map(|preference| AutoDeleteOption {
                id: preference.code(),
                name: i18n.t(&preference.locale_key()),
                preference,
            })
            .collect()
    }

    /// Earliest date the reminder picker accepts.
    pub fn min_date(&self) -> NaiveDate {
        self.min_date_at(Utc::now())
    }

    pub fn min_date_at(&self, now: DateTime<Utc>) -> NaiveDate {
        today_in(self.tz, now)
    }

    /// Mobile keyboards cover the modal, so the name field is not focused there.
    pub fn should_blur_name_input(&self) -> bool {
        self.options.is_mobile_device
    }

    pub fn user_has_timezone_set(&self) -> bool {
        self.options
            .user_timezone
            .as_deref()
            .is_some_and(|tz| !tz.trim().is_empty())
    }

    pub fn editing_existing_bookmark(&self) -> bool {
        lock(&self.form).bookmark().id.is_some()
    }

    pub fn existing_bookmark_has_reminder(&self) -> bool {
        let form = lock(&self.form);
        form.bookmark().id.is_some() && form.bookmark().reminder_at.is_some()
    }

    // ─── Accessors ───

    pub fn snapshot(&self) -> ModalSession {
        lock(&self.session).clone()
    }

    pub fn state(&self) -> ModalState {
        lock(&self.session).state
    }

    pub fn close_result(&self) -> Option<CloseResult> {
        lock(&self.session).close_result.clone()
    }

    pub fn bookmark(&self) -> Bookmark {
        lock(&self.form).bookmark().clone()
    }

    pub fn save_data(&self) -> SaveData {
        lock(&self.form).save_data()
    }

    pub fn bookmarkable_id(&self) -> i64 {
        self.bookmarkable_id
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    // ─── Internals ───

    /// Creates or updates the bookmark and returns the payload as saved,
    /// carrying the ID assigned by a create.
    async fn persist(&self) -> Result<SaveData, PersistenceError> {
        let payload = lock(&self.form).save_data();
        match payload.id {
            Some(id) => {
                self.persistence.update(id, &payload).await?;
                debug!(bookmark_id = id, "bookmark updated");
                Ok(payload)
            }
            None => {
                let created = self.persistence.create(&payload).await?;
                debug!(bookmark_id = created.id, "bookmark created");
                let mut form = lock(&self.form);
                form.assign_id(created.id);
                Ok(SaveData {
                    id: form.bookmark().id,
                    ..payload
                })
            }
        }
    }

    fn fire_after_save(&self, saved: &SaveData) {
        if let Some(after_save) = &self.callbacks.after_save {
            after_save(saved);
        }
    }

    fn flash_for(&self, err: &PersistenceError) -> String {
        warn!(bookmarkable_id = self.bookmarkable_id, error = %err, "bookmark call failed");
        sanitize(&err.user_message())
    }

    /// Moves the session to `Closed`. A session that is already closed keeps
    /// its first close result.
    fn close_session(
        &self,
        session: &mut ModalSession,
        discarded: bool,
        trigger: CloseTrigger,
    ) -> ActionOutcome {
        if let Some(existing) = &session.close_result {
            return ActionOutcome::Closed(existing.clone());
        }
        let result = CloseResult::new(discarded, trigger, self.bookmarkable_id);
        info!(
            bookmarkable_id = self.bookmarkable_id,
            trigger = %trigger,
            discarded,
            refresh = result.refresh_requested,
            "bookmark modal closed"
        );
        session.state = ModalState::Closed;
        session.close_result = Some(result.clone());
        ActionOutcome::Closed(result)
    }

    fn edit(&self, apply: impl FnOnce(&mut ModalSession, &mut BookmarkFormData)) -> bool {
        let mut session = lock(&self.session);
        if session.is_closed() {
            return false;
        }
        let mut form = lock(&self.form);
        apply(&mut *session, &mut *form);
        if session.state == ModalState::Idle {
            session.state = ModalState::Editing;
        }
        true
    }
}
