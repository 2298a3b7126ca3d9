//! Domain layer types and invariants.

pub mod baseline;
pub mod content;
pub mod error;
pub mod ordering;
