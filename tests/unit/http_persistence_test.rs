//! Unit tests for HttpBookmarkPersistence: response parsing plus requests
//! against a one-shot local HTTP listener.

use std::time::Duration;

use reqwest::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use bookmark_modal::services::bookmark_form_data::SaveData;
use bookmark_modal::services::http_persistence::{
    parse_created, parse_deleted, parse_error_body, HttpBookmarkPersistence,
};
use bookmark_modal::services::persistence::BookmarkPersistence;
use bookmark_modal::types::bookmark::{AutoDeletePreference, BookmarkableType};
use bookmark_modal::types::errors::PersistenceError;

fn payload() -> SaveData {
    SaveData {
        reminder_at: Some("2024-01-15T09:00:00.000Z".to_string()),
        name: Some("later".to_string()),
        id: None,
        auto_delete_preference: AutoDeletePreference::ClearReminder,
        bookmarkable_id: 42,
        bookmarkable_type: BookmarkableType::Post,
    }
}

/// Serves exactly one request and returns its raw text.
async fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&raw).to_string();
            if let Some(head_end) = text.find("\r\n\r\n") {
                let content_length = text[..head_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if raw.len() >= head_end + 4 + content_length {
                    break;
                }
            }
        }
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&raw).to_string()
    });
    (base, handle)
}

// ─── Parsing ───

#[test]
fn test_parse_error_body_reads_errors_array() {
    let err = parse_error_body(
        StatusCode::UNPROCESSABLE_ENTITY,
        r#"{"errors":["Title is invalid","Name is too long"]}"#,
    );
    assert_eq!(err.user_message(), "Title is invalid\nName is too long");
}

#[test]
fn test_parse_error_body_falls_back_to_error_field_then_text() {
    let err = parse_error_body(StatusCode::FORBIDDEN, r#"{"error":"not allowed"}"#);
    assert_eq!(
        err,
        PersistenceError::Rejected {
            status: 403,
            errors: vec!["not allowed".to_string()]
        }
    );

    let err = parse_error_body(StatusCode::BAD_GATEWAY, "upstream down");
    assert_eq!(err.user_message(), "upstream down");

    let err = parse_error_body(StatusCode::INTERNAL_SERVER_ERROR, "");
    assert_eq!(err.user_message(), "Request failed with status 500");
}

#[test]
fn test_parse_created_and_deleted() {
    assert_eq!(parse_created(r#"{"success":"OK","id":12}"#).unwrap().id, 12);
    assert!(matches!(parse_created("{}"), Err(PersistenceError::Parse(_))));

    assert!(parse_deleted(r#"{"topic_bookmarked":true}"#).unwrap().topic_bookmarked);
    assert!(!parse_deleted("").unwrap().topic_bookmarked);
}

#[test]
fn test_urls_trim_trailing_slash() {
    let http = HttpBookmarkPersistence::new("https://forum.example.com/", Duration::from_secs(5)).unwrap();
    assert_eq!(http.base_url(), "https://forum.example.com");
    assert_eq!(http.bookmarks_url(), "https://forum.example.com/bookmarks");
    assert_eq!(http.bookmark_url(7), "https://forum.example.com/bookmarks/7");
}

// ─── Requests ───

#[tokio::test]
async fn test_create_posts_form_and_reads_id() {
    let (base, server) = serve_once("200 OK", r#"{"success":"OK","id":55}"#).await;
    let http = HttpBookmarkPersistence::new(&base, Duration::from_secs(5))
        .unwrap()
        .with_api_key("secret");

    let created = http.create(&payload()).await.unwrap();

    assert_eq!(created.id, 55);
    let request = server.await.unwrap();
    assert!(request.starts_with("POST /bookmarks HTTP/1.1"));
    assert!(request.to_lowercase().contains("api-key: secret"));
    assert!(request.contains("reminder_at=2024-01-15T09%3A00%3A00.000Z"));
    assert!(request.contains("auto_delete_preference=3"));
    assert!(request.contains("bookmarkable_type=Post"));
    assert!(!request.contains("id=&"), "no id is sent on create");
}

#[tokio::test]
async fn test_update_puts_to_bookmark_url() {
    let (base, server) = serve_once("200 OK", r#"{"success":"OK"}"#).await;
    let http = HttpBookmarkPersistence::new(&base, Duration::from_secs(5)).unwrap();
    let mut data = payload();
    data.id = Some(8);

    http.update(8, &data).await.unwrap();

    let request = server.await.unwrap();
    assert!(request.starts_with("PUT /bookmarks/8 HTTP/1.1"));
    assert!(request.contains("id=8"));
}

#[tokio::test]
async fn test_rejected_create_surfaces_server_errors() {
    let (base, server) = serve_once(
        "422 Unprocessable Entity",
        r#"{"errors":["You have already bookmarked this post"]}"#,
    )
    .await;
    let http = HttpBookmarkPersistence::new(&base, Duration::from_secs(5)).unwrap();

    let err = http.create(&payload()).await.unwrap_err();

    assert_eq!(err.user_message(), "You have already bookmarked this post");
    server.await.unwrap();
}

#[tokio::test]
async fn test_delete_reads_topic_flag() {
    let (base, server) = serve_once("200 OK", r#"{"success":"OK","topic_bookmarked":false}"#).await;
    let http = HttpBookmarkPersistence::new(&base, Duration::from_secs(5)).unwrap();

    let deleted = http.delete(8).await.unwrap();

    assert!(!deleted.topic_bookmarked);
    assert!(server.await.unwrap().starts_with("DELETE /bookmarks/8 HTTP/1.1"));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    let http = HttpBookmarkPersistence::new(&base, Duration::from_secs(2)).unwrap();

    let err = http.delete(1).await.unwrap_err();

    assert!(matches!(err, PersistenceError::Network(_)));
}
