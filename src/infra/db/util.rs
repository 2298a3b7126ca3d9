use crate::application::repos::RepoError;

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::Database(db) if db.message().contains("duplicate key") => {
            RepoError::Integrity {
                message: format!(
                    "duplicate record violates unique constraint `{}`",
                    db.constraint().unwrap_or("unknown")
                ),
            }
        }
        sqlx::Error::Database(db) if db.message().contains("invalid input syntax") => {
            RepoError::InvalidInput {
                message: db.message().to_string(),
            }
        }
        sqlx::Error::Database(db) if db.message().contains("violates") => RepoError::Integrity {
            message: db.message().to_string(),
        },
        sqlx::Error::Database(db)
            if db
                .message()
                .contains("canceling statement due to user request") =>
        {
            RepoError::Timeout
        }
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::ColumnDecode { index, source } => {
            RepoError::decode(format!("column {index}: {source}"))
        }
        other => RepoError::from_persistence(other),
    }
}
