//! Core data models for the item catalog service.
//!
//! These entities represent items and the files attached to them.
//! They map cleanly to database tables via `sqlx::FromRow` and serialize
//! naturally as JSON via `serde`.

pub mod file;
pub mod item;
