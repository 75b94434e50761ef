use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::Identity;

/// Store-assigned bookmark identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookmarkId(String);

impl BookmarkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh identifier. Only stores call this.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookmarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BookmarkId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Represents a saved bookmark as returned by the shared store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: BookmarkId,
    pub url: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "user_id")]
    pub owner: Identity,
}

impl Bookmark {
    /// Host of the bookmark URL without a leading `www.`, or the raw URL when it
    /// does not parse.
    pub fn domain(&self) -> String {
        match url::Url::parse(&self.url) {
            Ok(parsed) => match parsed.host_str() {
                Some(host) => host.strip_prefix("www.").unwrap_or(host).to_string(),
                None => self.url.clone(),
            },
            Err(_) => self.url.clone(),
        }
    }

    /// Creation date in the short card format, e.g. `Oct 19, 2026`.
    pub fn created_on(&self) -> String {
        self.created_at.format("%b %-d, %Y").to_string()
    }
}

/// A validated add request: normalized URL and trimmed title.
///
/// Only [`crate::services::validation::validate_draft`] builds one, so a store
/// never sees unvalidated input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookmarkDraft {
    pub(crate) url: String,
    pub(crate) title: String,
}

impl BookmarkDraft {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

/// Label shown next to the list heading: `1 item`, `3 items`.
pub fn count_label(count: usize) -> String {
    if count == 1 {
        "1 item".to_string()
    } else {
        format!("{} items", count)
    }
}
