//! # auditscore
//!
//! Turns the flat list of check results produced by a website audit into
//! per-category health scores, issue counts and one weighted overall score.
//!
//! - [`scoring`] is pure: ingestion, aggregation and normalization.
//! - [`engine`] loads inputs, commits the summary and completes the audit.
//! - [`db`] is the SQLite implementation of the [`store`] traits.
//! - [`core::pipeline`] serializes summary requests through one writer.

pub mod catalog;
pub mod config;
pub mod core;
pub mod db;
pub mod engine;
pub mod error;
pub mod scoring;
pub mod store;

pub use crate::config::Config;
pub use crate::engine::{SummaryEngine, SummaryOutcome};
pub use crate::error::{EngineError, IngestError, StoreError};
