//! Bookmark modal RPC server: JSON-RPC over stdin/stdout.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! Request:  {"id":1, "method":"modal.open", "params":{"bookmarkable_id":12,"topic_id":3}}
//! Response: {"id":1, "result":{...}} or {"id":1, "error":"..."}
//!
//! Requests run concurrently, so a `modal.close` with `outside_click` can
//! arrive while a `modal.save` for the same session is still pending.
//! Logs go to stderr; stdout carries only protocol lines.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use bookmark_modal::app::App;
use bookmark_modal::rpc_handler::handle_method;

use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{error, info, warn, Level};

/// Simple rate limiter: max requests per second.
struct RateLimiter {
    window_start: Instant,
    request_count: u32,
    max_per_second: u32,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self { window_start: Instant::now(), request_count: 0, max_per_second }
    }

    /// Returns true if the request is allowed, false if rate-limited.
    fn check(&mut self) -> bool {
        if self.window_start.elapsed().as_secs() >= 1 {
            self.window_start = Instant::now();
            self.request_count = 0;
        }
        self.request_count += 1;
        self.request_count <= self.max_per_second
    }
}

fn write_line(value: &Value) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if writeln!(out, "{}", value).and_then(|_| out.flush()).is_err() {
        error!("failed to write response to stdout");
    }
}

fn main() {
    let level = std::env::var("BOOKMARK_MODAL_LOG")
        .ok()
        .and_then(|raw| raw.parse::<Level>().ok())
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(level)
        .init();

    let db_path = std::env::var("BOOKMARK_MODAL_DATA_DIR")
        .ok()
        .map(|dir| PathBuf::from(dir).join("bookmarks.db"));
    let config_path = std::env::var("BOOKMARK_MODAL_CONFIG").ok();

    let app = match App::from_settings(config_path, db_path) {
        Ok(app) => Arc::new(app),
        Err(e) => {
            error!(error = %e, "failed to initialize");
            std::process::exit(1);
        }
    };
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start tokio runtime");
            std::process::exit(1);
        }
    };

    write_line(&json!({"event": "ready", "version": env!("CARGO_PKG_VERSION")}));

    let mut rate_limiter = RateLimiter::new(200);
    let mut pending: Vec<JoinHandle<()>> = Vec::new();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                write_line(&json!({"id": null, "error": format!("parse error: {}", e)}));
                continue;
            }
        };

        let id = req.get("id").cloned().unwrap_or(Value::Null);

        if !rate_limiter.check() {
            warn!("rate limit exceeded");
            write_line(&json!({"id": id, "error": "rate limit exceeded"}));
            continue;
        }

        let method = req.get("method").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let params = req.get("params").cloned().unwrap_or(json!({}));
        let app = Arc::clone(&app);

        pending.retain(|handle| !handle.is_finished());
        pending.push(runtime.spawn(async move {
            let response = match handle_method(&app, &method, &params).await {
                Ok(val) => json!({"id": id, "result": val}),
                Err(err) => json!({"id": id, "error": err}),
            };
            write_line(&response);
        }));
    }

    runtime.block_on(async {
        for handle in pending {
            if let Err(e) = handle.await {
                error!(error = %e, "request task failed");
            }
        }
    });
    info!("stdin closed, shutting down");
}
