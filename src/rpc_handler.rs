//! RPC method handler for the bookmark modal JSON-RPC protocol.
//!
//! Kept apart from `rpc_server.rs` so it can be unit-tested independently.
//! `handle_method` dispatches a method call to the modal sessions, settings
//! and strings held by [`App`].

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::app::{App, OpenModal};
use crate::managers::modal_controller::ModalController;
use crate::services::localization_engine::{LocalizationEngineTrait, Translate};
use crate::services::settings_engine::SettingsEngineTrait;
use crate::types::bookmark::{AutoDeletePreference, Bookmark, BookmarkableType};
use crate::types::modal::{ActionOutcome, CloseTrigger};

fn session_param(params: &Value) -> Result<Uuid, String> {
    let raw = params
        .get("session")
        .and_then(|v| v.as_str())
        .ok_or("missing session")?;
    Uuid::parse_str(raw).map_err(|e| format!("invalid session: {}", e))
}

fn open_session(app: &App, params: &Value) -> Result<(Uuid, OpenModal), String> {
    let id = session_param(params)?;
    let open = app.session(&id).ok_or("unknown session")?;
    Ok((id, open))
}

fn controller(app: &App, params: &Value) -> Result<(Uuid, Arc<ModalController>), String> {
    let (id, open) = open_session(app, params)?;
    Ok((id, open.controller))
}

/// The host's copy of an existing bookmark, passed to `modal.open`. The
/// target comes from the call's own `bookmarkable_*` params.
#[derive(Deserialize)]
struct ExistingBookmark {
    id: i64,
    #[serde(default)]
    reminder_at: Option<DateTime<Utc>>,
    #[serde(default)]
    auto_delete_preference: Option<AutoDeletePreference>,
    #[serde(default)]
    name: Option<String>,
}

impl ExistingBookmark {
    fn into_bookmark(self, bookmarkable_type: BookmarkableType, bookmarkable_id: i64) -> Bookmark {
        Bookmark {
            id: Some(self.id),
            bookmarkable_id,
            bookmarkable_type,
            reminder_at: self.reminder_at,
            auto_delete_preference: self.auto_delete_preference.unwrap_or_default(),
            name: self.name.filter(|n| !n.is_empty()),
            selected_datetime: None,
        }
    }
}

/// Reads an optional string field; JSON `null` or absence mean "clear".
fn nullable_str<'a>(params: &'a Value, key: &str) -> Result<Option<&'a str>, String> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(format!("{} must be a string or null", key)),
    }
}

fn modal_state(app: &App, id: &Uuid, ctrl: &ModalController) -> Result<Value, String> {
    let i18n = app.localization_engine.lock().map_err(|e| e.to_string())?;
    Ok(json!({
        "session": id.to_string(),
        "state": ctrl.snapshot(),
        "bookmark": ctrl.bookmark(),
        "save_data": ctrl.save_data(),
        "title": ctrl.modal_title(&*i18n),
        "auto_delete_options": ctrl.auto_delete_options(&*i18n),
        "min_date": ctrl.min_date(),
        "should_blur_name_input": ctrl.should_blur_name_input(),
        "user_has_timezone_set": ctrl.user_has_timezone_set(),
        "editing_existing_bookmark": ctrl.editing_existing_bookmark(),
        "existing_bookmark_has_reminder": ctrl.existing_bookmark_has_reminder(),
    }))
}

/// Reports an action's outcome; a closed session is dropped from the registry.
fn action_response(app: &App, id: &Uuid, open: &OpenModal, outcome: ActionOutcome) -> Value {
    if open.controller.snapshot().is_closed() {
        app.finish_session(id);
    }
    json!({
        "outcome": outcome,
        "state": open.controller.snapshot(),
        "events": open.take_events(),
    })
}

fn edit_response(ctrl: &ModalController, applied: bool) -> Value {
    json!({"applied": applied, "state": ctrl.snapshot(), "save_data": ctrl.save_data()})
}

/// Dispatch a JSON-RPC method call to the appropriate handler.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub async fn handle_method(app: &App, method: &str, params: &Value) -> Result<Value, String> {
    debug!(method, "rpc call");
    match method {
        "ping" => Ok(json!({"pong": true, "backend": app.backend().name()})),

        // ─── Modal sessions ───
        "modal.open" => {
            let bookmarkable_id = params
                .get("bookmarkable_id")
                .and_then(|v| v.as_i64())
                .ok_or("missing bookmarkable_id")?;
            let bookmarkable_type = match params.get("bookmarkable_type").and_then(|v| v.as_str()) {
                Some(raw) => raw.parse::<BookmarkableType>()?,
                None => BookmarkableType::Post,
            };
            let topic_id = match (params.get("topic_id").and_then(|v| v.as_i64()), bookmarkable_type) {
                (Some(topic_id), _) => topic_id,
                (None, BookmarkableType::Topic) => bookmarkable_id,
                (None, BookmarkableType::Post) => return Err("missing topic_id".to_string()),
            };
            let existing = match params.get("bookmark") {
                None | Some(Value::Null) => None,
                Some(raw) => {
                    let parsed: ExistingBookmark = serde_json::from_value(raw.clone())
                        .map_err(|e| format!("invalid bookmark: {}", e))?;
                    Some(parsed.into_bookmark(bookmarkable_type, bookmarkable_id))
                }
            };
            let (id, ctrl) = app
                .open_modal(bookmarkable_type, bookmarkable_id, topic_id, existing)
                .map_err(|e| e.to_string())?;
            modal_state(app, &id, &ctrl)
        }
        "modal.state" => {
            let (id, ctrl) = controller(app, params)?;
            modal_state(app, &id, &ctrl)
        }
        "modal.set_name" => {
            let (_, ctrl) = controller(app, params)?;
            let name = nullable_str(params, "name")?.map(str::to_string);
            Ok(edit_response(&ctrl, ctrl.set_name(name)))
        }
        "modal.set_auto_delete" => {
            let (_, ctrl) = controller(app, params)?;
            let code = params
                .get("preference")
                .and_then(|v| v.as_u64())
                .ok_or("missing preference")?;
            let preference = u8::try_from(code)
                .ok()
                .and_then(AutoDeletePreference::from_code)
                .ok_or_else(|| format!("unknown auto delete preference: {}", code))?;
            Ok(edit_response(&ctrl, ctrl.set_auto_delete_preference(preference)))
        }
        "modal.toggle_options" => {
            let (_, ctrl) = controller(app, params)?;
            Ok(edit_response(&ctrl, ctrl.toggle_options()))
        }
        "modal.change_date" => {
            let (_, ctrl) = controller(app, params)?;
            let date = nullable_str(params, "date")?
                .map(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
                .transpose()
                .map_err(|e| format!("invalid date: {}", e))?;
            Ok(edit_response(&ctrl, ctrl.change_selected_date(date)))
        }
        "modal.change_time" => {
            let (_, ctrl) = controller(app, params)?;
            let time = nullable_str(params, "time")?
                .map(|raw| NaiveTime::parse_from_str(raw, "%H:%M"))
                .transpose()
                .map_err(|e| format!("invalid time: {}", e))?;
            Ok(edit_response(&ctrl, ctrl.change_selected_time(time)))
        }
        "modal.save" => {
            let (id, open) = open_session(app, params)?;
            let outcome = open.controller.save_and_close().await;
            Ok(action_response(app, &id, &open, outcome))
        }
        "modal.discard" => {
            let (id, open) = open_session(app, params)?;
            let outcome = open.controller.close_without_saving();
            Ok(action_response(app, &id, &open, outcome))
        }
        "modal.close" => {
            let (id, open) = open_session(app, params)?;
            let trigger = params
                .get("trigger")
                .and_then(|v| v.as_str())
                .ok_or("missing trigger")?
                .parse::<CloseTrigger>()?;
            let outcome = open.controller.closing_modal(trigger).await;
            Ok(action_response(app, &id, &open, outcome))
        }
        "modal.delete" => {
            let (id, open) = open_session(app, params)?;
            let outcome = open.controller.delete_bookmark().await;
            Ok(action_response(app, &id, &open, outcome))
        }

        // ─── Bookmarks ───
        "bookmark.list" => {
            let topic_id = params
                .get("topic_id")
                .and_then(|v| v.as_i64())
                .ok_or("missing topic_id")?;
            let bookmarks = match app.local_store() {
                Some(store) => store.list_for_topic(topic_id).map_err(|e| e.to_string())?,
                None => app.topic(topic_id).map_err(|e| e.to_string())?.bookmarks,
            };
            Ok(json!(bookmarks))
        }
        "bookmark.seed" => {
            let topic_id = params
                .get("topic_id")
                .and_then(|v| v.as_i64())
                .ok_or("missing topic_id")?;
            let raw = params.get("bookmarks").cloned().ok_or("missing bookmarks")?;
            let bookmarks: Vec<Bookmark> =
                serde_json::from_value(raw).map_err(|e| format!("invalid bookmarks: {}", e))?;
            let count = bookmarks.len();
            app.seed_topic(topic_id, bookmarks);
            Ok(json!({"seeded": count}))
        }

        // ─── Settings ───
        "settings.get" => {
            let engine = app.settings_engine.lock().map_err(|e| e.to_string())?;
            serde_json::to_value(engine.get_settings()).map_err(|e| e.to_string())
        }
        "settings.set" => {
            let key = params.get("key").and_then(|v| v.as_str()).ok_or("missing key")?;
            let value = params.get("value").cloned().ok_or("missing value")?;
            let mut engine = app.settings_engine.lock().map_err(|e| e.to_string())?;
            engine.set_value(key, value).map_err(|e| e.to_string())?;
            if key == "locale.language" {
                let language = engine.get_settings().locale.language.clone();
                drop(engine);
                let mut i18n = app.localization_engine.lock().map_err(|e| e.to_string())?;
                i18n.set_locale(&language).map_err(|e| e.to_string())?;
            }
            Ok(json!({"ok": true}))
        }

        // ─── Localization ───
        "i18n.t" => {
            let key = params.get("key").and_then(|v| v.as_str()).ok_or("missing key")?;
            let i18n = app.localization_engine.lock().map_err(|e| e.to_string())?;
            Ok(json!({"text": i18n.t(key)}))
        }
        "i18n.locale" => {
            let i18n = app.localization_engine.lock().map_err(|e| e.to_string())?;
            Ok(json!({"locale": i18n.get_locale()}))
        }

        _ => Err(format!("unknown method: {}", method)),
    }
}
