//! Content store adapters.

mod content;
mod unconfigured;
mod util;

pub use content::PostgresContentStore;
pub use unconfigured::UnconfiguredContentStore;
pub use util::map_sqlx_error;

use std::sync::Arc;

use crate::application::repos::ContentRepo;
use crate::config::DatabaseSettings;
use crate::infra::error::InfraError;

/// Build the store described by `settings`.
///
/// Without a database URL the unconfigured store is returned, which answers
/// every call locally without network I/O.
pub fn content_store(settings: &DatabaseSettings) -> Result<Arc<dyn ContentRepo>, InfraError> {
    match settings.url.as_deref() {
        Some(url) => {
            let pool = PostgresContentStore::connect_lazy(url, settings.max_connections.get())
                .map_err(|err| InfraError::database(format!("invalid database url: {err}")))?;
            Ok(Arc::new(PostgresContentStore::new(
                pool,
                settings.record_id.clone(),
            )))
        }
        None => Ok(Arc::new(UnconfiguredContentStore)),
    }
}
