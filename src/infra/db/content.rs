use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    query, query_as,
    types::Json,
};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::{
    application::repos::{ContentRepo, RepoError},
    domain::content::ContentSnapshot,
};

use super::map_sqlx_error;

const SELECT_CONTENT: &str = "SELECT content, updated_at FROM site_content WHERE id = $1";
const DELETE_CONTENT: &str = "DELETE FROM site_content WHERE id = $1";
const INSERT_CONTENT: &str = "INSERT INTO site_content (id, content, created_at, updated_at) \
     VALUES ($1, $2, $3, $4)";

#[derive(sqlx::FromRow)]
struct ContentRow {
    content: Option<Json<Value>>,
    updated_at: Option<OffsetDateTime>,
}

/// The `site_content` table, holding one row keyed by `record_id`.
#[derive(Clone)]
pub struct PostgresContentStore {
    pool: Arc<PgPool>,
    record_id: String,
}

impl PostgresContentStore {
    pub fn new(pool: PgPool, record_id: impl Into<String>) -> Self {
        Self {
            pool: Arc::new(pool),
            record_id: record_id.into(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create a pool that connects on first use, so an unreachable database
    /// surfaces as a store error on the first load or save.
    pub fn connect_lazy(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(url)
    }
}

#[async_trait]
impl ContentRepo for PostgresContentStore {
    async fn load_content(&self) -> Result<Option<ContentSnapshot>, RepoError> {
        let row = query_as::<_, ContentRow>(SELECT_CONTENT)
            .bind(&self.record_id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            debug!(record_id = %self.record_id, "No content row");
            return Ok(None);
        };

        let content = match row.content {
            Some(Json(Value::Null)) | None => {
                debug!(record_id = %self.record_id, "Content row has no content");
                return Ok(None);
            }
            Some(Json(content)) => content,
        };

        let snapshot: ContentSnapshot =
            serde_json::from_value(content).map_err(RepoError::decode)?;
        debug!(
            record_id = %self.record_id,
            updated_at = ?row.updated_at,
            blocks = snapshot.blocks.len(),
            "Content row loaded"
        );
        Ok(Some(snapshot))
    }

    async fn replace_content(&self, snapshot: &ContentSnapshot) -> Result<(), RepoError> {
        let content = serde_json::to_value(snapshot).map_err(|err| RepoError::InvalidInput {
            message: format!("content cannot be encoded: {err}"),
        })?;

        // Not transactional: a failure after the delete leaves no row behind.
        match query(DELETE_CONTENT)
            .bind(&self.record_id)
            .execute(self.pool())
            .await
        {
            Ok(result) => debug!(
                record_id = %self.record_id,
                removed = result.rows_affected(),
                "Previous content row deleted"
            ),
            Err(err) => warn!(
                record_id = %self.record_id,
                error = %err,
                "Deleting previous content row failed; inserting anyway"
            ),
        }

        let now = OffsetDateTime::now_utc();
        query(INSERT_CONTENT)
            .bind(&self.record_id)
            .bind(Json(content))
            .bind(now)
            .bind(now)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        info!(record_id = %self.record_id, "Content row written");
        Ok(())
    }
}
