//! Guarded persistence for the editable blocks of a marketing site.
//!
//! Content is loaded from a single database record, normalized into a fixed
//! display order, and saved back with debouncing. A rule-based classifier
//! keeps placeholder content from overwriting real edits.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub(crate) mod util;
