//! Utility functions for account reference normalization and filenames

use crate::error::{Error, Result};

/// Characters that are unsafe in filenames on common filesystems
const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Maximum length of a sanitized filename stem
const MAX_FILENAME_LEN: usize = 200;

/// Maximum length of a title derived from a caption
const MAX_TITLE_LEN: usize = 100;

/// Normalize a free-form account reference to a bare handle
///
/// Accepts a bare handle, an `@handle`, or a full profile URL. For URLs
/// the handle is the first path segment after the host, with any query
/// string or trailing segments discarded.
///
/// # Examples
///
/// ```
/// use reel_dl::utils::normalize_handle;
///
/// assert_eq!(normalize_handle("@natgeo").unwrap(), "natgeo");
/// assert_eq!(
///     normalize_handle("https://instagram.com/natgeo/reels/?x=1").unwrap(),
///     "natgeo"
/// );
/// assert!(normalize_handle("   ").is_err());
/// ```
pub fn normalize_handle(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidAccountRef(
            "empty account reference".to_string(),
        ));
    }

    let candidate = if trimmed.contains("://") {
        handle_from_url(trimmed)?
    } else {
        let bare = trimmed.trim_start_matches('@');
        // Schemeless URLs like "instagram.com/natgeo" still carry a host:
        // a dot before the first slash distinguishes them from handles.
        match bare.split_once('/') {
            Some((host, _)) if host.contains('.') => {
                handle_from_url(&format!("https://{bare}"))?
            }
            _ => bare.to_string(),
        }
    };

    let handle = candidate
        .trim_start_matches('@')
        .trim_matches('/')
        .trim()
        .to_string();

    if handle.is_empty() {
        return Err(Error::InvalidAccountRef(format!(
            "could not extract a handle from '{trimmed}'"
        )));
    }

    Ok(handle)
}

/// Extract the first non-empty path segment of a profile URL
fn handle_from_url(raw: &str) -> Result<String> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| Error::InvalidAccountRef(format!("unparsable URL '{raw}': {e}")))?;

    parsed
        .path_segments()
        .and_then(|mut segments| segments.find(|s| !s.is_empty()).map(str::to_string))
        .ok_or_else(|| {
            Error::InvalidAccountRef(format!("URL '{raw}' has no path segment to use as a handle"))
        })
}

/// Sanitize a string for use as a filename
///
/// Replaces characters that are invalid on common filesystems with
/// underscores and caps the length at 200 characters.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if INVALID_FILENAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();

    truncate_chars(replaced.trim(), MAX_FILENAME_LEN)
        .trim()
        .to_string()
}

/// Derive a human-readable title from a post caption
///
/// Takes the first line, drops `#hashtag` words, and caps the length.
/// Returns an empty string for captions that contain nothing else, in
/// which case callers fall back to the post id.
pub fn title_from_caption(caption: &str) -> String {
    let first_line = caption.lines().next().unwrap_or("");
    let without_tags: Vec<&str> = first_line
        .split_whitespace()
        .filter(|word| !word.starts_with('#'))
        .collect();

    truncate_chars(&without_tags.join(" "), MAX_TITLE_LEN)
}

/// Truncate a message to a bounded number of characters
///
/// Error causes and log payloads are stored verbatim but bounded; the
/// cut falls on a character boundary, never mid-codepoint.
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    truncate_chars(message, max_chars)
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}
