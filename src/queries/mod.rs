//! SQL text builders for the recordings store.
//!
//! Every function returns a rendered SQLite statement so callers can hand it
//! straight to `sqlx::query`.

pub mod ddl;
pub mod recordings;
