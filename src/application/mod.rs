//! Application services layer.

pub mod classifier;
pub mod error;
pub mod events;
pub mod interchange;
pub mod reconciler;
pub mod repos;
