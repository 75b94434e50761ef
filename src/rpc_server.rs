//! marksync RPC server: one bookmark session driven over stdin/stdout.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! Request:  {"id":1, "method":"bookmark.add", "params":{"url":"...","title":"..."}}
//! Response: {"id":1, "result":{...}} or {"id":1, "error":"..."}
//! Events:   {"event":"ready",...}, {"event":"items",...}, {"event":"status",...}
//!
//! The identity comes from `$MARKSYNC_IDENTITY` or the first argument.

use std::time::Instant;

use serde_json::{json, Value};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};

use marksync::app::App;
use marksync::rpc_handler::{handle_method, items_json, status_json};
use marksync::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use marksync::telemetry::init_tracing;
use marksync::types::identity::Identity;

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

async fn emit(stdout: &mut io::Stdout, value: &Value) -> std::io::Result<()> {
    let mut line = value.to_string();
    line.push('\n');
    stdout.write_all(line.as_bytes()).await?;
    stdout.flush().await
}

#[tokio::main]
async fn main() {
    let mut settings_engine = SettingsEngine::new(None);
    let settings = match settings_engine.load() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("marksync-rpc: {}", err);
            std::process::exit(2);
        }
    };
    init_tracing(&settings.log_filter);

    let raw_identity = std::env::var("MARKSYNC_IDENTITY")
        .ok()
        .or_else(|| std::env::args().nth(1))
        .unwrap_or_default();
    let identity = match Identity::new(raw_identity) {
        Ok(identity) => identity,
        Err(err) => {
            error!(target: "marksync.rpc", error = %err, "no identity given");
            std::process::exit(2);
        }
    };

    let app = match App::new(settings) {
        Ok(app) => app,
        Err(err) => {
            error!(target: "marksync.rpc", error = %err, "failed to open store");
            std::process::exit(1);
        }
    };
    let session = match app.open_session(identity).await {
        Ok(session) => session,
        Err(err) => {
            error!(target: "marksync.rpc", error = %err, "failed to start session");
            std::process::exit(1);
        }
    };
    let handle = session.handle();
    let mut items = handle.subscribe_items();
    let mut status = handle.subscribe_status();

    let mut stdout = io::stdout();
    let ready = json!({"event": "ready", "version": env!("CARGO_PKG_VERSION")});
    if emit(&mut stdout, &ready).await.is_err() {
        return;
    }
    info!(target: "marksync.rpc", identity = %handle.identity(), "rpc session ready");

    // Caps requests at 200 per second
    let mut rate_limiter = RateLimiter::new(200);
    let mut lines = BufReader::new(io::stdin()).lines();

    loop {
        let outgoing = tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(err) => {
                        warn!(target: "marksync.rpc", error = %err, "stdin read failed");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }

                match serde_json::from_str::<Value>(&line) {
                    Err(e) => json!({"id": null, "error": format!("parse error: {}", e)}),
                    Ok(req) => {
                        let id = req.get("id").cloned().unwrap_or(Value::Null);
                        if !rate_limiter.check() {
                            json!({"id": id, "error": "rate limit exceeded"})
                        } else {
                            let method = req.get("method").and_then(|v| v.as_str()).unwrap_or("");
                            let params = req.get("params").cloned().unwrap_or(json!({}));
                            match handle_method(&handle, method, &params).await {
                                Ok(val) => json!({"id": id, "result": val}),
                                Err(err) => json!({"id": id, "error": err}),
                            }
                        }
                    }
                }
            }
            Ok(()) = items.changed() => {
                let snapshot = items.borrow_and_update().clone();
                json!({"event": "items", "data": items_json(&snapshot)})
            }
            Ok(()) = status.changed() => {
                let current = *status.borrow_and_update();
                json!({"event": "status", "data": status_json(current)})
            }
        };

        if emit(&mut stdout, &outgoing).await.is_err() {
            break;
        }
    }

    session.shutdown().await;
    info!(target: "marksync.rpc", "rpc session closed");
}
