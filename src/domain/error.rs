use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("block id `{id}` appears more than once")]
    DuplicateBlock { id: String },
    #[error("domain validation failed: {message}")]
    Validation { message: String },
    #[error("domain invariant violated: {message}")]
    Invariant { message: String },
}

impl DomainError {
    pub fn duplicate_block(id: impl Into<String>) -> Self {
        Self::DuplicateBlock { id: id.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }
}
