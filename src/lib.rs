//! Marking of final year projects.
//!
//! Every student has a coursework and a practice report, each marked
//! independently by a first and a second marker. This crate keeps the marks,
//! aggregates them into totals and decides who may see and change what.

pub mod aggregation;
pub mod auth;
pub mod config;
pub mod error;
pub mod fields;
pub mod manage;
mod model;
pub mod report;
pub mod schema;

pub use config::MarkingConfig;
pub use error::MarkingError;

use sqlx::sqlite::SqlitePool;

/// What every handler needs: the pool and the settings it was opened with
pub struct MarkingCon {
    pub database: SqlitePool,
    pub config: MarkingConfig,
}

impl MarkingCon {
    pub async fn open(config: &MarkingConfig) -> Result<MarkingCon, MarkingError> {
        manage::open(config).await
    }
}
