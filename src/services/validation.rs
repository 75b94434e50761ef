//! Add-form validation.
//!
//! Runs before any network call. A URL typed without a scheme gets the default
//! one prepended; the stored value is that prefixed input, not a re-serialized
//! URL, so `example.com` becomes `https://example.com` without a trailing slash.

use url::Url;

use crate::types::bookmark::BookmarkDraft;
use crate::types::errors::ValidationError;

/// Prepends `default_scheme` to `input` when it carries no scheme.
pub fn normalize_url(input: &str, default_scheme: &str) -> String {
    let input = input.trim();
    if input.contains("://") {
        input.to_string()
    } else {
        let scheme = default_scheme.trim_end_matches("://");
        format!("{}://{}", scheme, input)
    }
}

/// Validates raw form input into a [`BookmarkDraft`].
pub fn validate_draft(
    url_input: &str,
    title_input: &str,
    default_scheme: &str,
) -> Result<BookmarkDraft, ValidationError> {
    let title = title_input.trim();
    if url_input.trim().is_empty() || title.is_empty() {
        return Err(ValidationError::MissingFields);
    }

    let url = normalize_url(url_input, default_scheme);
    let parsed = Url::parse(&url).map_err(|_| ValidationError::InvalidUrl(url.clone()))?;
    if parsed.cannot_be_a_base() || parsed.host_str().map_or(true, str::is_empty) {
        return Err(ValidationError::InvalidUrl(url));
    }

    Ok(BookmarkDraft {
        url,
        title: title.to_string(),
    })
}
