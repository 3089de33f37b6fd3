//! Collaborator seams between the engine and whatever holds the data.
//!
//! The SQLite implementation lives in [`crate::db`]; tests substitute their
//! own implementations to inject failures.

use chrono::{DateTime, Utc};

use crate::catalog::Catalog;
use crate::core::{Audit, AuditSummary, CategoryScore, RawCheckResult, SummaryId};
use crate::error::StoreError;

/// Read access to reference data and crawler output.
pub trait ResultSource {
    fn load_catalog(&self) -> Result<Catalog, StoreError>;
    fn load_results(&self, audit_id: &str) -> Result<Vec<RawCheckResult>, StoreError>;
}

pub trait AuditStore {
    fn find_audit(&self, audit_id: &str) -> Result<Option<Audit>, StoreError>;

    /// Set `status = completed` and `completed_at`. Errors with `NotFound`
    /// when no audit row matched.
    fn mark_completed(&self, audit_id: &str, completed_at: DateTime<Utc>) -> Result<(), StoreError>;
}

pub trait SummaryStore {
    /// Insert or overwrite the summary keyed by `summary.audit_id`.
    fn upsert_summary(&self, summary: &AuditSummary) -> Result<SummaryId, StoreError>;

    /// Insert or overwrite one row per `(summary_id, category_id)`.
    fn upsert_category_scores(
        &self,
        summary_id: SummaryId,
        scores: &[CategoryScore],
    ) -> Result<(), StoreError>;

    /// Write the summary and its category scores as one batch.
    ///
    /// The default runs the two upserts back to back and is not atomic: if the
    /// category write fails, the summary row is already stored with stale or
    /// missing category rows until the next successful run. Stores that can
    /// group writes must override this. [`crate::db::SharedDatabase`] does,
    /// using one SQLite transaction.
    fn commit_summary(
        &self,
        summary: &AuditSummary,
        scores: &[CategoryScore],
    ) -> Result<SummaryId, StoreError> {
        let id = self.upsert_summary(summary)?;
        self.upsert_category_scores(id, scores)?;
        Ok(id)
    }
}
