//! RPC method handler for the marksync JSON-RPC protocol.
//!
//! Extracted from `rpc_server.rs` so it can be unit-tested independently.
//! `handle_method` is the presentation layer's only way into a session: it
//! turns requests into `add`/`delete`/`reconcile` intents and renders the
//! session's list and status.

use serde_json::{json, Value};

use crate::managers::bookmark_session::{DeleteOutcome, SessionHandle};
use crate::types::bookmark::{count_label, Bookmark, BookmarkId};
use crate::types::status::ConnectionStatus;

/// Renders a bookmark the way the list view shows it.
pub fn bookmark_json(bookmark: &Bookmark) -> Value {
    json!({
        "id": bookmark.id,
        "url": bookmark.url,
        "title": bookmark.title,
        "created_at": bookmark.created_at.to_rfc3339(),
        "created_on": bookmark.created_on(),
        "domain": bookmark.domain(),
    })
}

/// Renders the whole list with its count label.
pub fn items_json(items: &[Bookmark]) -> Value {
    json!({
        "count": items.len(),
        "label": count_label(items.len()),
        "items": items.iter().map(bookmark_json).collect::<Vec<_>>(),
    })
}

pub fn status_json(status: ConnectionStatus) -> Value {
    json!({"status": status, "label": status.label()})
}

/// Dispatch a JSON-RPC method call to the session.
///
/// Returns `Ok(Value)` on success or `Err(String)` with a user-facing message.
pub async fn handle_method(session: &SessionHandle, method: &str, params: &Value) -> Result<Value, String> {
    match method {
        "ping" => Ok(json!({"pong": true})),

        // ─── Bookmarks ───
        "bookmark.add" => {
            let url = params.get("url").and_then(|v| v.as_str()).ok_or("missing url")?;
            let title = params.get("title").and_then(|v| v.as_str()).ok_or("missing title")?;
            let bookmark = session.add(url, title).await.map_err(|e| e.to_string())?;
            Ok(bookmark_json(&bookmark))
        }
        "bookmark.list" => Ok(items_json(&session.items())),
        "bookmark.delete" => {
            let id = params.get("id").and_then(|v| v.as_str()).ok_or("missing id")?;
            let outcome = session
                .delete(&BookmarkId::from(id))
                .await
                .map_err(|e| e.to_string())?;
            let state = match outcome {
                DeleteOutcome::Armed => "armed",
                DeleteOutcome::Deleted => "deleted",
                DeleteOutcome::InFlight => "in_flight",
            };
            let hint = match outcome {
                DeleteOutcome::Armed => "Click again to confirm",
                _ => "",
            };
            Ok(json!({"state": state, "hint": hint}))
        }
        "bookmark.reconcile" => {
            let count = session.reconcile().await.map_err(|e| e.to_string())?;
            Ok(json!({"count": count}))
        }

        // ─── Sync ───
        "sync.status" => Ok(status_json(session.status())),

        _ => Err(format!("unknown method: {}", method)),
    }
}
