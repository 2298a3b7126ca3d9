//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::content::ContentSnapshot;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("content store is not configured")]
    NotConfigured,
    #[error("stored content could not be decoded: {message}")]
    Decode { message: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode {
            message: err.to_string(),
        }
    }
}

/// The single persisted content record.
///
/// Implementations hold exactly one row keyed by a fixed id and treat the
/// content as one opaque blob; they never apply the default-content gate.
#[async_trait]
pub trait ContentRepo: Send + Sync {
    /// Fetch the stored snapshot, `None` when no record exists.
    async fn load_content(&self) -> Result<Option<ContentSnapshot>, RepoError>;

    /// Overwrite the stored record with `snapshot`.
    async fn replace_content(&self, snapshot: &ContentSnapshot) -> Result<(), RepoError>;
}
