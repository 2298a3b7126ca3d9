//! Text interchange for content snapshots.

use thiserror::Error;

use crate::domain::content::ContentSnapshot;

#[derive(Debug, Error)]
pub enum InterchangeError {
    #[error("invalid content format: {reason}")]
    InvalidFormat { reason: String },
    #[error("failed to encode content: {0}")]
    Encode(#[source] serde_json::Error),
}

impl InterchangeError {
    fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            reason: reason.into(),
        }
    }
}

/// Serialize `snapshot` as pretty-printed JSON.
pub fn export_content(snapshot: &ContentSnapshot) -> Result<String, InterchangeError> {
    serde_json::to_string_pretty(snapshot).map_err(InterchangeError::Encode)
}

/// Parse a snapshot previously produced by [`export_content`].
///
/// Fails without side effects on malformed text or duplicate block ids.
pub fn import_content(text: &str) -> Result<ContentSnapshot, InterchangeError> {
    let snapshot: ContentSnapshot =
        serde_json::from_str(text).map_err(|err| InterchangeError::invalid(err.to_string()))?;
    snapshot
        .validate()
        .map_err(|err| InterchangeError::invalid(err.to_string()))?;
    Ok(snapshot)
}
