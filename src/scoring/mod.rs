pub mod aggregate;
pub mod ingest;
pub mod score;
pub mod trend;

use crate::catalog::Catalog;
use crate::core::{CategoryScore, RawCheckResult};
use crate::error::IngestError;
use aggregate::SeverityTally;
use ingest::DuplicatePolicy;
use score::WeightTable;

/// Everything derived from one audit's results, before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scorecard {
    pub overall_score: u8,
    pub category_scores: Vec<CategoryScore>,
    pub total_issues: u32,
    pub severity: SeverityTally,
}

/// The pure half of summary generation: ingest, aggregate, normalize.
/// Never touches storage.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    weights: WeightTable,
    duplicate_policy: DuplicatePolicy,
}

impl ScoringEngine {
    pub fn new(weights: WeightTable, duplicate_policy: DuplicatePolicy) -> Self {
        Self {
            weights,
            duplicate_policy,
        }
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    pub fn compute(
        &self,
        audit_id: &str,
        raw: &[RawCheckResult],
        catalog: &Catalog,
    ) -> Result<Scorecard, IngestError> {
        let batch = ingest::ingest(audit_id, raw, catalog, self.duplicate_policy)?;
        let aggregation = aggregate::aggregate(&batch.results, catalog);
        if aggregation.skipped > 0 {
            tracing::debug!(audit_id, skipped = aggregation.skipped, "Results without a known category");
        }

        let overall_score = score::compute_overall(&aggregation.category_scores, &self.weights);
        let total_issues: u32 = aggregation
            .category_scores
            .iter()
            .map(|c| c.warning_count + c.error_count)
            .sum();

        Ok(Scorecard {
            overall_score,
            category_scores: aggregation.category_scores,
            total_issues,
            severity: aggregation.severity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Category, Check};
    use pretty_assertions::assert_eq;

    fn catalog() -> Catalog {
        let slugs = ["seo", "performance", "mobile"];
        Catalog::new(
            slugs
                .iter()
                .enumerate()
                .map(|(i, s)| Category { id: i as i64 + 1, name: s.to_uppercase(), slug: (*s).into() })
                .collect(),
            (1..=3)
                .flat_map(|cat| {
                    (0..4).map(move |n| Check {
                        id: cat * 10 + n,
                        category_id: cat,
                        name: format!("check {n}"),
                        weight: 1.0,
                    })
                })
                .collect(),
        )
    }

    fn engine() -> ScoringEngine {
        let weights: WeightTable = [("seo", 0.25), ("performance", 0.25), ("security", 0.2)]
            .into_iter()
            .collect();
        ScoringEngine::new(weights, DuplicatePolicy::CountAll)
    }

    fn raw(check_id: i64, status: &str, severity: Option<&str>) -> RawCheckResult {
        RawCheckResult {
            audit_id: "a1".into(),
            check_id,
            status: status.into(),
            severity: severity.map(str::to_string),
        }
    }

    #[test]
    fn seo_and_performance() {
        let results = vec![
            raw(10, "passed", None),
            raw(11, "passed", None),
            raw(12, "warning", Some("medium")),
            raw(13, "error", Some("high")),
            raw(20, "passed", None),
        ];
        let card = engine().compute("a1", &results, &catalog()).unwrap();
        assert_eq!(card.category_scores.len(), 2);
        assert_eq!(card.category_scores[0].score, 87);
        assert_eq!(card.category_scores[1].score, 100);
        assert_eq!(card.overall_score, 94);
        assert_eq!(card.total_issues, 2);
        assert_eq!(card.severity, SeverityTally { high: 1, medium: 1, low: 0 });
    }

    #[test]
    fn no_results() {
        let card = engine().compute("a1", &[], &catalog()).unwrap();
        assert_eq!(
            card,
            Scorecard {
                overall_score: 0,
                category_scores: vec![],
                total_issues: 0,
                severity: SeverityTally::default(),
            }
        );
    }

    #[test]
    fn unweighted_category_scored_but_excluded() {
        let results = vec![
            raw(10, "passed", None),
            raw(30, "error", Some("high")),
            raw(31, "error", Some("high")),
        ];
        let card = engine().compute("a1", &results, &catalog()).unwrap();
        let mobile = card
            .category_scores
            .iter()
            .find(|c| c.category_slug == "mobile")
            .unwrap();
        assert_eq!(mobile.score, 80);
        assert_eq!(card.overall_score, 100);
        assert_eq!(card.total_issues, 2);
    }

    #[test]
    fn compute_is_deterministic() {
        let results = vec![
            raw(21, "warning", Some("low")),
            raw(10, "error", Some("medium")),
            raw(32, "warning", Some("bogus")),
        ];
        let first = engine().compute("a1", &results, &catalog()).unwrap();
        let second = engine().compute("a1", &results, &catalog()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn new_failure_only_moves_its_category() {
        let mut results = vec![raw(10, "passed", None), raw(20, "passed", None)];
        let before = engine().compute("a1", &results, &catalog()).unwrap();
        results.push(raw(21, "error", Some("high")));
        let after = engine().compute("a1", &results, &catalog()).unwrap();

        assert_eq!(before.category_scores[0], after.category_scores[0]);
        assert_eq!(after.category_scores[1].score, 90);
        assert_eq!(after.overall_score, 95);
        assert!(after.overall_score < before.overall_score);
    }
}
