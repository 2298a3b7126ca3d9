//! Infrastructure adapters and runtime bootstrap.

pub mod baseline;
pub mod db;
pub mod error;
pub mod telemetry;
