//! Pattern normalization
//!
//! Turns whatever the user typed into the popup into a canonical
//! `hostname[/path]` pattern. Scheme, port, credentials, query and
//! fragment are all dropped.

use url::Url;

use crate::types::BlockPattern;

/// Error type for pattern normalization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("Empty pattern")]
    Empty,
    #[error("Invalid URL: {0}")]
    InvalidPattern(String),
}

/// Normalize raw user input into a [`BlockPattern`].
///
/// Input without an `http://` or `https://` prefix is treated as `https://`.
/// A pathname of exactly `/` is dropped.
pub fn normalize_pattern(raw: &str) -> Result<BlockPattern, PatternError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PatternError::Empty);
    }

    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let parsed = Url::parse(&with_scheme)
        .map_err(|e| PatternError::InvalidPattern(format!("{}: {}", trimmed, e)))?;

    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| PatternError::InvalidPattern(format!("{}: missing host", trimmed)))?;

    let mut clean = host.to_string();
    let path = parsed.path();
    if !path.is_empty() && path != "/" {
        clean.push_str(path);
    }

    Ok(BlockPattern::from_stored(clean))
}
