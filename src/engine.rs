//! Summary generation: load, compute, commit, then complete the audit.
//!
//! The arithmetic lives in [`crate::scoring`] and never performs I/O; this
//! module is the only place that talks to the collaborators. Concurrent calls
//! for the same audit are last-writer-wins; route requests through
//! [`crate::core::pipeline`] when they must be serialized.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::core::{AuditSummary, CategoryScore, SummaryId};
use crate::error::{EngineError, Stage, StoreError};
use crate::scoring::{Scorecard, ScoringEngine};
use crate::store::{AuditStore, ResultSource, SummaryStore};

/// What one successful run produced and persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryOutcome {
    pub summary_id: SummaryId,
    pub summary: AuditSummary,
    pub category_scores: Vec<CategoryScore>,
}

pub struct SummaryEngine<S> {
    store: S,
    scoring: ScoringEngine,
}

impl<S> SummaryEngine<S>
where
    S: ResultSource + AuditStore + SummaryStore,
{
    pub fn new(store: S, scoring: ScoringEngine) -> Self {
        Self { store, scoring }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn scoring(&self) -> &ScoringEngine {
        &self.scoring
    }

    pub fn summarize(&self, audit_id: &str) -> Result<SummaryOutcome, EngineError> {
        self.summarize_at(audit_id, Utc::now())
    }

    /// Run the full pipeline, stamping `completed_at` with the given instant.
    pub fn summarize_at(
        &self,
        audit_id: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<SummaryOutcome, EngineError> {
        let audit = self
            .store
            .find_audit(audit_id)
            .map_err(|e| store_error(audit_id, Stage::Load, e))?
            .ok_or_else(|| EngineError::AuditNotFound {
                audit_id: audit_id.to_string(),
            })?;
        let catalog = self
            .store
            .load_catalog()
            .map_err(|e| store_error(audit_id, Stage::Load, e))?;
        let raw = self
            .store
            .load_results(audit_id)
            .map_err(|e| store_error(audit_id, Stage::Load, e))?;
        debug!(audit_id, results = raw.len(), "Loaded check results");

        let card: Scorecard = self
            .scoring
            .compute(audit_id, &raw, &catalog)
            .map_err(|source| EngineError::InvalidInput {
                audit_id: audit_id.to_string(),
                source,
            })?;
        debug!(audit_id, categories = card.category_scores.len(), "Computed scorecard");

        let summary = AuditSummary {
            audit_id: audit_id.to_string(),
            overall_score: card.overall_score,
            total_pages: audit.total_pages,
            total_issues: card.total_issues,
            high_severity_issues: card.severity.high,
            medium_severity_issues: card.severity.medium,
            low_severity_issues: card.severity.low,
            completed_at,
        };

        let summary_id = self
            .store
            .commit_summary(&summary, &card.category_scores)
            .map_err(|e| store_error(audit_id, Stage::Commit, e))?;
        debug!(audit_id, %summary_id, "Summary committed");

        self.store
            .mark_completed(audit_id, completed_at)
            .map_err(|e| store_error(audit_id, Stage::Transition, e))?;

        info!(
            audit_id,
            overall_score = summary.overall_score,
            categories = card.category_scores.len(),
            "Audit summary generated"
        );

        Ok(SummaryOutcome {
            summary_id,
            summary,
            category_scores: card.category_scores,
        })
    }
}

fn store_error(audit_id: &str, stage: Stage, source: StoreError) -> EngineError {
    error!(audit_id, %stage, "Summary generation failed: {source}");
    EngineError::Store {
        audit_id: audit_id.to_string(),
        stage,
        source,
    }
}
