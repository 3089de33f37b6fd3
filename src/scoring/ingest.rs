use std::collections::HashMap;

use serde::Deserialize;

use crate::catalog::Catalog;
use crate::core::{CheckStatus, RawCheckResult, Severity};
use crate::error::IngestError;

/// What to do when the same check is reported more than once for one audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Every occurrence is scored.
    #[default]
    CountAll,
    /// The last occurrence in input order replaces earlier ones.
    LastWins,
}

/// A validated result with its check resolved to a category id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedResult {
    pub check_id: i64,
    pub category_id: i64,
    pub status: CheckStatus,
    /// `None` when absent or unrecognized.
    pub severity: Option<Severity>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedBatch {
    pub audit_id: String,
    pub results: Vec<IngestedResult>,
    /// Occurrences beyond the first for any check id.
    pub duplicates: usize,
}

/// Validate raw results for `audit_id` against the catalog.
///
/// Rejects unknown checks, unknown statuses and results belonging to another
/// audit. Severity is never rejected here; unrecognized values are carried as
/// `None` and handled by the deduction fallback.
pub fn ingest(
    audit_id: &str,
    raw: &[RawCheckResult],
    catalog: &Catalog,
    policy: DuplicatePolicy,
) -> Result<IngestedBatch, IngestError> {
    let mut results: Vec<IngestedResult> = Vec::with_capacity(raw.len());
    let mut positions: HashMap<i64, usize> = HashMap::with_capacity(raw.len());
    let mut duplicates = 0;

    for item in raw {
        if item.audit_id != audit_id {
            return Err(IngestError::AuditMismatch {
                check_id: item.check_id,
                expected: audit_id.to_string(),
                found: item.audit_id.clone(),
            });
        }
        let check = catalog
            .check(item.check_id)
            .ok_or(IngestError::UnknownCheck { check_id: item.check_id })?;
        let status: CheckStatus =
            item.status
                .parse()
                .map_err(|status| IngestError::UnknownStatus {
                    check_id: item.check_id,
                    status,
                })?;
        let severity = item.severity.as_deref().and_then(Severity::parse_lenient);
        if status != CheckStatus::Passed && severity.is_none() {
            tracing::debug!(
                audit_id,
                check_id = item.check_id,
                severity = ?item.severity,
                "Unrecognized severity, low tier applies"
            );
        }

        let ingested = IngestedResult {
            check_id: check.id,
            category_id: check.category_id,
            status,
            severity,
        };

        match positions.get(&check.id) {
            Some(&pos) => {
                duplicates += 1;
                match policy {
                    DuplicatePolicy::CountAll => results.push(ingested),
                    DuplicatePolicy::LastWins => results[pos] = ingested,
                }
            }
            None => {
                positions.insert(check.id, results.len());
                results.push(ingested);
            }
        }
    }

    if duplicates > 0 {
        tracing::warn!(audit_id, duplicates, ?policy, "Duplicate check results in batch");
    }

    Ok(IngestedBatch {
        audit_id: audit_id.to_string(),
        results,
        duplicates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Category, Check};

    fn catalog() -> Catalog {
        Catalog::new(
            vec![Category { id: 1, name: "SEO".into(), slug: "seo".into() }],
            vec![
                Check { id: 10, category_id: 1, name: "Title".into(), weight: 1.0 },
                Check { id: 11, category_id: 1, name: "Meta".into(), weight: 1.0 },
            ],
        )
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
    fn resolves_category_and_severity() {
        let batch = ingest(
            "a1",
            &[raw(10, "error", Some("high")), raw(11, "passed", None)],
            &catalog(),
            DuplicatePolicy::CountAll,
        )
        .unwrap();
        assert_eq!(batch.results.len(), 2);
        assert_eq!(batch.results[0].category_id, 1);
        assert_eq!(batch.results[0].status, CheckStatus::Error);
        assert_eq!(batch.results[0].severity, Some(Severity::High));
        assert_eq!(batch.results[1].severity, None);
        assert_eq!(batch.duplicates, 0);
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = ingest("a1", &[raw(10, "skipped", None)], &catalog(), DuplicatePolicy::CountAll)
            .unwrap_err();
        assert_eq!(
            err,
            IngestError::UnknownStatus { check_id: 10, status: "skipped".into() }
        );
    }

    #[test]
    fn status_case_variants_are_rejected() {
        for status in ["ERROR", " passed ", "Warning"] {
            let err = ingest("a1", &[raw(10, status, None)], &catalog(), DuplicatePolicy::CountAll)
                .unwrap_err();
            assert_eq!(
                err,
                IngestError::UnknownStatus { check_id: 10, status: status.into() }
            );
        }
    }

    #[test]
    fn unknown_check_is_rejected() {
        let err = ingest("a1", &[raw(99, "passed", None)], &catalog(), DuplicatePolicy::CountAll)
            .unwrap_err();
        assert_eq!(err, IngestError::UnknownCheck { check_id: 99 });
    }

    #[test]
    fn foreign_audit_is_rejected() {
        let mut other = raw(10, "passed", None);
        other.audit_id = "a2".into();
        let err = ingest("a1", &[other], &catalog(), DuplicatePolicy::CountAll).unwrap_err();
        assert!(matches!(err, IngestError::AuditMismatch { .. }));
    }

    #[test]
    fn unrecognized_severity_is_kept_as_none() {
        let batch = ingest(
            "a1",
            &[raw(10, "warning", Some("catastrophic"))],
            &catalog(),
            DuplicatePolicy::CountAll,
        )
        .unwrap();
        assert_eq!(batch.results[0].severity, None);

        let batch = ingest("a1", &[raw(10, "error", Some("HIGH"))], &catalog(), DuplicatePolicy::CountAll)
            .unwrap();
        assert_eq!(batch.results[0].severity, None);
    }

    #[test]
    fn duplicates_counted_under_count_all() {
        let batch = ingest(
            "a1",
            &[raw(10, "warning", Some("low")), raw(10, "error", Some("high"))],
            &catalog(),
            DuplicatePolicy::CountAll,
        )
        .unwrap();
        assert_eq!(batch.results.len(), 2);
        assert_eq!(batch.duplicates, 1);
    }

    #[test]
    fn duplicates_replaced_under_last_wins() {
        let batch = ingest(
            "a1",
            &[
                raw(10, "warning", Some("low")),
                raw(11, "passed", None),
                raw(10, "error", Some("high")),
            ],
            &catalog(),
            DuplicatePolicy::LastWins,
        )
        .unwrap();
        assert_eq!(batch.results.len(), 2);
        assert_eq!(batch.duplicates, 1);
        assert_eq!(batch.results[0].check_id, 10);
        assert_eq!(batch.results[0].status, CheckStatus::Error);
    }
}
