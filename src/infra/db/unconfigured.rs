use async_trait::async_trait;
use tracing::warn;

use crate::{
    application::repos::{ContentRepo, RepoError},
    domain::content::ContentSnapshot,
};

/// Stand-in used when no database credentials are configured.
///
/// Loads report no record and saves fail, both without any I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredContentStore;

#[async_trait]
impl ContentRepo for UnconfiguredContentStore {
    async fn load_content(&self) -> Result<Option<ContentSnapshot>, RepoError> {
        warn!("Content store not configured; no stored content available");
        Ok(None)
    }

    async fn replace_content(&self, _snapshot: &ContentSnapshot) -> Result<(), RepoError> {
        warn!("Content store not configured; save skipped");
        Err(RepoError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::content::{Block, BlockType};

    #[tokio::test]
    async fn loads_nothing_and_refuses_writes() {
        let store = UnconfiguredContentStore;
        assert!(store.load_content().await.expect("load").is_none());

        let snapshot = ContentSnapshot::new(vec![Block::new("hero", BlockType::Hero, "Hi")]);
        let err = store
            .replace_content(&snapshot)
            .await
            .expect_err("write refused");
        assert!(matches!(err, RepoError::NotConfigured));
    }
}
