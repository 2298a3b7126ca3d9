use std::error::Error as StdError;

use thiserror::Error;

use crate::{
    application::{classifier::ClassifyError, interchange::InterchangeError, repos::RepoError},
    infra::{baseline::BaselineError, error::InfraError},
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Interchange(#[from] InterchangeError),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error("baseline content unavailable: {0}")]
    Baseline(#[from] BaselineError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// The error followed by each of its sources, outermost first.
    pub fn chain(&self) -> Vec<String> {
        let mut messages = vec![self.to_string()];
        let mut current = StdError::source(self);
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        messages
    }

    /// Process exit code for the command-line binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Interchange(InterchangeError::InvalidFormat { .. })
            | AppError::Validation(_) => 2,
            AppError::Infra(InfraError::Configuration { .. })
            | AppError::Classify(_)
            | AppError::Baseline(_) => 3,
            AppError::Infra(InfraError::Database { .. }) | AppError::Repo(_) => 4,
            _ => 1,
        }
    }
}
