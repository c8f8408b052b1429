//! Remote bookmark persistence over the forum's HTTP API.
//!
//! `POST /bookmarks`, `PUT /bookmarks/{id}` and `DELETE /bookmarks/{id}`,
//! with the save payload sent as form parameters.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::services::bookmark_form_data::SaveData;
use crate::services::persistence::{BookmarkPersistence, CreatedBookmark, DeletedBookmark};
use crate::types::errors::PersistenceError;

/// HTTP client for the bookmarks endpoints.
pub struct HttpBookmarkPersistence {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpBookmarkPersistence {
    /// Creates a client for `base_url` (e.g. `https://forum.example.com`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PersistenceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PersistenceError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
        })
    }

    /// Sends `Api-Key` with every request.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn bookmarks_url(&self) -> String {
        format!("{}/bookmarks", self.base_url)
    }

    pub fn bookmark_url(&self, id: i64) -> String {
        format!("{}/bookmarks/{}", self.base_url, id)
    }

    fn prepare(&self, req: RequestBuilder) -> RequestBuilder {
        let req = req.header("Accept", "application/json");
        match &self.api_key {
            Some(key) => req.header("Api-Key", key),
            None => req,
        }
    }

    /// Sends the request and returns the body of a 2xx response.
    async fn send(&self, req: RequestBuilder, ctx: &str) -> Result<String, PersistenceError> {
        let resp = self.prepare(req).send().await.map_err(|e| {
            warn!(ctx, error = %e, "bookmark request failed");
            PersistenceError::Network(e.to_string())
        })?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| PersistenceError::Network(e.to_string()))?;
        debug!(ctx, status = status.as_u16(), "bookmark request completed");
        if status.is_success() {
            Ok(body)
        } else {
            Err(parse_error_body(status, &body))
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Turns a non-2xx response into a [`PersistenceError::Rejected`].
///
/// Reads the JSON `errors` array, then a single `error` field, then falls
/// back to the raw body text.
pub fn parse_error_body(status: StatusCode, body: &str) -> PersistenceError {
    let errors = match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => parsed.errors,
        Ok(ErrorBody {
            error: Some(error), ..
        }) => vec![error],
        Ok(_) => Vec::new(),
        Err(_) => {
            let text = body.trim();
            if text.is_empty() {
                Vec::new()
            } else {
                vec![text.to_string()]
            }
        }
    };
    PersistenceError::Rejected {
        status: status.as_u16(),
        errors,
    }
}

/// Reads the new bookmark ID from a create response (`{"success":"OK","id":12}`).
pub fn parse_created(body: &str) -> Result<CreatedBookmark, PersistenceError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| PersistenceError::Parse(e.to_string()))?;
    value
        .get("id")
        .and_then(Value::as_i64)
        .map(|id| CreatedBookmark { id })
        .ok_or_else(|| PersistenceError::Parse("create response has no id".to_string()))
}

/// Reads the delete response. An empty body means the topic is no longer bookmarked.
pub fn parse_deleted(body: &str) -> Result<DeletedBookmark, PersistenceError> {
    if body.trim().is_empty() {
        return Ok(DeletedBookmark::default());
    }
    serde_json::from_str(body).map_err(|e| PersistenceError::Parse(e.to_string()))
}

#[async_trait]
impl BookmarkPersistence for HttpBookmarkPersistence {
    async fn create(&self, payload: &SaveData) -> Result<CreatedBookmark, PersistenceError> {
        let req = self
            .client
            .post(self.bookmarks_url())
            .form(&payload.to_form_params());
        let body = self.send(req, "create bookmark").await?;
        parse_created(&body)
    }

    async fn update(&self, id: i64, payload: &SaveData) -> Result<(), PersistenceError> {
        let req = self
            .client
            .put(self.bookmark_url(id))
            .form(&payload.to_form_params());
        self.send(req, "update bookmark").await?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<DeletedBookmark, PersistenceError> {
        let req = self.client.delete(self.bookmark_url(id));
        let body = self.send(req, "delete bookmark").await?;
        parse_deleted(&body)
    }
}
