//! Unit tests for the RPC handler: every JSON-RPC method dispatched by
//! `handle_method`, driven through the same code path as the
//! `bookmark-modal-rpc` binary with an in-memory store.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;
use uuid::Uuid;

use bookmark_modal::app::{App, Backend};
use bookmark_modal::managers::host_bridge::HostEvent;
use bookmark_modal::rpc_handler::handle_method;
use bookmark_modal::services::http_persistence::HttpBookmarkPersistence;
use bookmark_modal::services::localization_engine::LocalizationEngine;
use bookmark_modal::services::settings_engine::SettingsEngine;
use bookmark_modal::types::bookmark::{AutoDeletePreference, Bookmark, BookmarkableType};
use bookmark_modal::types::modal::CloseTrigger;

/// Fresh App with settings in a temp directory and an in-memory store.
fn setup() -> (App, TempDir) {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let config = tmp.path().join("settings.json").to_string_lossy().to_string();
    let app = App::in_memory(config).expect("Failed to init App");
    (app, tmp)
}

async fn call(app: &App, method: &str, params: Value) -> Value {
    handle_method(app, method, &params)
        .await
        .unwrap_or_else(|e| panic!("{} failed: {}", method, e))
}

async fn open_post(app: &App, post_id: i64) -> String {
    let res = call(app, "modal.open", json!({"bookmarkable_id": post_id, "topic_id": 9})).await;
    res["session"].as_str().unwrap().to_string()
}

/// App talking to a forum that is never reached by these tests.
fn setup_remote() -> (App, TempDir) {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let config = tmp.path().join("settings.json").to_string_lossy().to_string();
    let http = HttpBookmarkPersistence::new("http://127.0.0.1:9", Duration::from_secs(1))
        .expect("Failed to build client");
    let app = App::new(
        SettingsEngine::new(Some(config)),
        LocalizationEngine::builtin(),
        Backend::Remote(Arc::new(http)),
    );
    (app, tmp)
}

// ─── Ping / unknown ───

#[tokio::test]
async fn test_ping() {
    let (app, _tmp) = setup();
    let res = call(&app, "ping", json!({})).await;
    assert_eq!(res, json!({"pong": true, "backend": "sqlite"}));
}

#[tokio::test]
async fn test_unknown_method_returns_error() {
    let (app, _tmp) = setup();
    let res = handle_method(&app, "nonexistent.method", &json!({})).await;
    assert!(res.unwrap_err().contains("unknown method"));
}

// ─── Modal lifecycle ───

#[tokio::test]
async fn test_open_new_post_bookmark() {
    let (app, _tmp) = setup();

    let res = call(&app, "modal.open", json!({"bookmarkable_id": 100, "topic_id": 9})).await;

    assert_eq!(res["title"], "Create bookmark");
    assert_eq!(res["editing_existing_bookmark"], false);
    assert_eq!(res["state"]["state"], "idle");
    assert_eq!(res["save_data"]["bookmarkable_type"], "Post");
    assert_eq!(res["save_data"]["auto_delete_preference"], 3);
    assert!(res["save_data"].get("id").is_none());
    assert_eq!(res["auto_delete_options"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_open_post_requires_topic() {
    let (app, _tmp) = setup();
    let err = handle_method(&app, "modal.open", &json!({"bookmarkable_id": 100}))
        .await
        .unwrap_err();
    assert_eq!(err, "missing topic_id");
}

#[tokio::test]
async fn test_edit_and_save_then_reopen_as_existing() {
    let (app, _tmp) = setup();
    call(&app, "settings.set", json!({"key": "user.timezone", "value": "America/New_York"})).await;
    let session = open_post(&app, 100).await;

    call(&app, "modal.set_name", json!({"session": session, "name": "later"})).await;
    call(&app, "modal.change_date", json!({"session": session, "date": "2024-01-15"})).await;
    let edited = call(&app, "modal.change_time", json!({"session": session, "time": "04:00"})).await;
    assert_eq!(edited["save_data"]["reminder_at"], "2024-01-15T09:00:00.000Z");

    let saved = call(&app, "modal.save", json!({"session": session})).await;
    assert_eq!(saved["outcome"]["outcome"], "closed");
    assert_eq!(saved["outcome"]["trigger"], "programmatic");
    assert_eq!(saved["events"][0]["event"], "bookmark_saved");
    assert_eq!(app.open_session_count(), 0, "closed sessions are dropped");

    let reopened = call(&app, "modal.open", json!({"bookmarkable_id": 100, "topic_id": 9})).await;
    assert_eq!(reopened["title"], "Edit bookmark");
    assert_eq!(reopened["state"]["reminder_date"], "2024-01-15");
    assert_eq!(reopened["state"]["reminder_time"], "04:00:00");
    assert_eq!(reopened["existing_bookmark_has_reminder"], true);

    let listed = call(&app, "bookmark.list", json!({"topic_id": 9})).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["name"], "later");
}

#[tokio::test]
async fn test_escape_close_requests_refresh() {
    let (app, _tmp) = setup();
    let session = open_post(&app, 100).await;

    let res = call(&app, "modal.close", json!({"session": session, "trigger": "escape"})).await;

    assert_eq!(res["outcome"]["refresh_requested"], true);
    assert_eq!(
        res["events"],
        json!([{"event": "refresh_requested", "bookmarkable_id": 100}])
    );
}

#[tokio::test]
async fn test_outside_click_saves_new_bookmark() {
    let (app, _tmp) = setup();
    let session = open_post(&app, 100).await;

    let res = call(&app, "modal.close", json!({"session": session, "trigger": "outside_click"})).await;

    assert_eq!(res["outcome"]["trigger"], "outside_click");
    assert_eq!(res["outcome"]["discarded"], false);
    let listed = call(&app, "bookmark.list", json!({"topic_id": 9})).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_discard_makes_no_bookmark() {
    let (app, _tmp) = setup();
    let session = open_post(&app, 100).await;
    call(&app, "modal.set_name", json!({"session": session, "name": "unsaved"})).await;

    let res = call(&app, "modal.discard", json!({"session": session})).await;

    assert_eq!(res["outcome"]["discarded"], true);
    let listed = call(&app, "bookmark.list", json!({"topic_id": 9})).await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_save_error_keeps_session_open() {
    let (app, _tmp) = setup();
    let first = open_post(&app, 100).await;
    let second = open_post(&app, 100).await;
    call(&app, "modal.save", json!({"session": first})).await;

    let res = call(&app, "modal.save", json!({"session": second})).await;

    assert_eq!(res["outcome"]["outcome"], "stayed_open");
    assert_eq!(res["outcome"]["flash"], "You have already bookmarked this post");
    assert_eq!(res["state"]["state"], "editing");
    assert!(call(&app, "modal.state", json!({"session": second})).await.is_object());
}

#[tokio::test]
async fn test_delete_saved_bookmark() {
    let (app, _tmp) = setup();
    let session = open_post(&app, 100).await;
    call(&app, "modal.save", json!({"session": session})).await;

    let session = open_post(&app, 100).await;
    let res = call(&app, "modal.delete", json!({"session": session})).await;

    assert_eq!(res["outcome"]["outcome"], "closed");
    assert_eq!(res["events"][0]["event"], "bookmark_removed");
    assert_eq!(res["events"][0]["topic_bookmarked"], false);
    let listed = call(&app, "bookmark.list", json!({"topic_id": 9})).await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_set_auto_delete_and_toggle_options() {
    let (app, _tmp) = setup();
    let session = open_post(&app, 100).await;

    let res = call(&app, "modal.set_auto_delete", json!({"session": session, "preference": 1})).await;
    assert_eq!(res["save_data"]["auto_delete_preference"], 1);

    let res = call(&app, "modal.toggle_options", json!({"session": session})).await;
    assert_eq!(res["state"]["show_options"], true);

    let err = handle_method(&app, "modal.set_auto_delete", &json!({"session": session, "preference": 9}))
        .await
        .unwrap_err();
    assert!(err.contains("unknown auto delete preference"));
}

#[tokio::test]
async fn test_clearing_date_with_null() {
    let (app, _tmp) = setup();
    let session = open_post(&app, 100).await;
    call(&app, "modal.change_date", json!({"session": session, "date": "2030-06-01"})).await;

    let res = call(&app, "modal.change_date", json!({"session": session, "date": null})).await;

    assert_eq!(res["save_data"]["reminder_at"], Value::Null);
}

#[tokio::test]
async fn test_invalid_params_are_errors() {
    let (app, _tmp) = setup();
    let session = open_post(&app, 100).await;

    let bad_date = handle_method(&app, "modal.change_date", &json!({"session": session, "date": "15/01/2024"})).await;
    assert!(bad_date.unwrap_err().starts_with("invalid date"));

    let bad_trigger = handle_method(&app, "modal.close", &json!({"session": session, "trigger": "swipe"})).await;
    assert!(bad_trigger.unwrap_err().contains("unknown close trigger"));

    let unknown = handle_method(
        &app,
        "modal.state",
        &json!({"session": "00000000-0000-0000-0000-000000000000"}),
    )
    .await;
    assert_eq!(unknown.unwrap_err(), "unknown session");
}

#[tokio::test]
async fn test_events_stay_with_their_session() {
    let (app, _tmp) = setup();
    let first = open_post(&app, 100).await;
    let second = open_post(&app, 101).await;

    let first_id = Uuid::parse_str(&first).unwrap();
    let open = app.session(&first_id).unwrap();
    open.controller.closing_modal(CloseTrigger::Escape).await;
    app.finish_session(&first_id);
    assert_eq!(
        open.take_events(),
        vec![HostEvent::RefreshRequested { bookmarkable_id: 100 }]
    );

    let res = call(&app, "modal.close", json!({"session": second, "trigger": "escape"})).await;
    assert_eq!(
        res["events"],
        json!([{"event": "refresh_requested", "bookmarkable_id": 101}])
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_closes_report_their_own_events() {
    let (app, _tmp) = setup();
    let first = open_post(&app, 100).await;
    let second = open_post(&app, 101).await;

    let (a, b) = tokio::join!(
        call(&app, "modal.close", json!({"session": first, "trigger": "escape"})),
        call(&app, "modal.close", json!({"session": second, "trigger": "button"})),
    );

    assert_eq!(a["events"], json!([{"event": "refresh_requested", "bookmarkable_id": 100}]));
    assert_eq!(b["events"], json!([{"event": "refresh_requested", "bookmarkable_id": 101}]));
}

#[tokio::test]
async fn test_topic_state_released_with_last_session() {
    let (app, _tmp) = setup();
    let first = open_post(&app, 100).await;
    let second = open_post(&app, 101).await;
    call(&app, "modal.open", json!({"bookmarkable_id": 200, "topic_id": 10})).await;
    assert_eq!(app.tracked_topic_count(), 2);

    call(&app, "modal.close", json!({"session": first, "trigger": "escape"})).await;
    assert_eq!(app.tracked_topic_count(), 2, "topic 9 still has a session");

    call(&app, "modal.save", json!({"session": second})).await;
    assert_eq!(app.tracked_topic_count(), 1);

    let listed = call(&app, "bookmark.list", json!({"topic_id": 9})).await;
    assert_eq!(listed.as_array().unwrap().len(), 1, "store still has the saved row");
}

// ─── Remote backend ───

#[tokio::test]
async fn test_app_backends_are_sqlite_or_http() {
    let (local, _a) = setup();
    let (remote, _b) = setup_remote();
    assert_eq!(call(&local, "ping", json!({})).await["backend"], "sqlite");
    assert_eq!(call(&remote, "ping", json!({})).await["backend"], "http");
}

#[tokio::test]
async fn test_remote_open_with_existing_bookmark_prefills() {
    let (app, _tmp) = setup_remote();
    call(&app, "settings.set", json!({"key": "user.timezone", "value": "America/New_York"})).await;

    let res = call(
        &app,
        "modal.open",
        json!({
            "bookmarkable_id": 100,
            "topic_id": 9,
            "bookmark": {"id": 77, "reminder_at": "2024-01-15T09:00:00.000Z", "name": "later"}
        }),
    )
    .await;

    assert_eq!(res["editing_existing_bookmark"], true);
    assert_eq!(res["title"], "Edit bookmark");
    assert_eq!(res["bookmark"]["id"], 77);
    assert_eq!(res["save_data"]["id"], 77);
    assert_eq!(res["state"]["reminder_date"], "2024-01-15");
    assert_eq!(res["state"]["reminder_time"], "04:00:00");
    assert_eq!(res["existing_bookmark_has_reminder"], true);

    let listed = call(&app, "bookmark.list", json!({"topic_id": 9})).await;
    assert_eq!(listed[0]["id"], 77);
}

#[tokio::test]
async fn test_remote_open_after_seed_finds_bookmark() {
    let (app, _tmp) = setup_remote();
    let seeded = call(
        &app,
        "bookmark.seed",
        json!({
            "topic_id": 9,
            "bookmarks": [{
                "id": 5,
                "bookmarkable_id": 100,
                "bookmarkable_type": "Post",
                "reminder_at": null,
                "auto_delete_preference": 0,
                "name": "seeded"
            }]
        }),
    )
    .await;
    assert_eq!(seeded["seeded"], 1);

    let res = call(&app, "modal.open", json!({"bookmarkable_id": 100, "topic_id": 9})).await;

    assert_eq!(res["editing_existing_bookmark"], true);
    assert_eq!(res["bookmark"]["name"], "seeded");
    assert_eq!(res["save_data"]["auto_delete_preference"], 0);
}

#[tokio::test]
async fn test_remote_open_validates_bookmark_param() {
    let (app, _tmp) = setup_remote();

    let bad = handle_method(
        &app,
        "modal.open",
        &json!({"bookmarkable_id": 100, "topic_id": 9, "bookmark": {"reminder_at": "soon"}}),
    )
    .await;
    assert!(bad.unwrap_err().starts_with("invalid bookmark"));

    let ok = call(
        &app,
        "modal.open",
        json!({"bookmarkable_id": 9, "bookmarkable_type": "Topic", "bookmark": {"id": 3}}),
    )
    .await;
    assert_eq!(ok["editing_existing_bookmark"], true);
    assert_eq!(ok["save_data"]["bookmarkable_type"], "Topic");
}

#[tokio::test]
async fn test_open_modal_refuses_bookmark_for_another_post() {
    let (app, _tmp) = setup_remote();
    let elsewhere = Bookmark::create_for(BookmarkableType::Post, 101, AutoDeletePreference::Never);

    let err = app
        .open_modal(BookmarkableType::Post, 100, 9, Some(elsewhere))
        .unwrap_err();

    assert!(err.to_string().contains("does not belong to"), "{}", err);
    assert_eq!(app.open_session_count(), 0);
    assert_eq!(app.tracked_topic_count(), 0);
}

// ─── Settings / i18n ───

#[tokio::test]
async fn test_settings_get_and_set() {
    let (app, _tmp) = setup();

    call(&app, "settings.set", json!({"key": "device.is_mobile", "value": true})).await;
    let settings = call(&app, "settings.get", json!({})).await;
    assert_eq!(settings["device"]["is_mobile"], true);

    let session = open_post(&app, 100).await;
    let state = call(&app, "modal.state", json!({"session": session})).await;
    assert_eq!(state["should_blur_name_input"], true);

    let err = handle_method(&app, "settings.set", &json!({"key": "nope.nothing", "value": 1}))
        .await
        .unwrap_err();
    assert!(err.contains("Invalid settings key"));
}

#[tokio::test]
async fn test_i18n_translate() {
    let (app, _tmp) = setup();

    let res = call(&app, "i18n.t", json!({"key": "bookmarks.edit"})).await;
    assert_eq!(res["text"], "Edit bookmark");

    let res = call(&app, "i18n.t", json!({"key": "bookmarks.missing_key"})).await;
    assert_eq!(res["text"], "bookmarks.missing_key");

    let res = call(&app, "i18n.locale", json!({})).await;
    assert_eq!(res["locale"], "en");
}
