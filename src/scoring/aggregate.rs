use std::collections::BTreeMap;

use crate::catalog::{Catalog, Category};
use crate::core::{CategoryScore, CheckStatus, Severity};
use crate::scoring::ingest::IngestedResult;

/// Every category starts here and only loses points.
pub const MAX_CATEGORY_SCORE: u32 = 100;

/// Non-passed results by severity. Unrecognized severities count as low.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeverityTally {
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    /// One entry per category with at least one result, ordered by category id.
    pub category_scores: Vec<CategoryScore>,
    pub severity: SeverityTally,
    /// Results whose category is not in the catalog.
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy)]
struct Tally {
    score: u32,
    issue_count: u32,
    passed_count: u32,
    warning_count: u32,
    error_count: u32,
}

impl Tally {
    const fn fresh() -> Self {
        Self {
            score: MAX_CATEGORY_SCORE,
            issue_count: 0,
            passed_count: 0,
            warning_count: 0,
            error_count: 0,
        }
    }
}

/// Look up the result's category. Results that cannot be placed are skipped,
/// not rejected.
pub fn resolve_category_or_skip<'a>(
    catalog: &'a Catalog,
    result: &IngestedResult,
) -> Option<&'a Category> {
    let category = catalog.category(result.category_id);
    if category.is_none() {
        tracing::debug!(
            check_id = result.check_id,
            category_id = result.category_id,
            "Result references unknown category, skipping"
        );
    }
    category
}

/// Points removed from a category for one result. A missing or unrecognized
/// severity takes the low tier.
pub fn severity_deduction_or_default(status: CheckStatus, severity: Option<Severity>) -> u32 {
    match (status, severity.unwrap_or(Severity::Low)) {
        (CheckStatus::Passed, _) => 0,
        (CheckStatus::Warning, Severity::High) => 5,
        (CheckStatus::Warning, Severity::Medium) => 3,
        (CheckStatus::Warning, Severity::Low) => 1,
        (CheckStatus::Error, Severity::High) => 10,
        (CheckStatus::Error, Severity::Medium) => 7,
        (CheckStatus::Error, Severity::Low) => 3,
    }
}

/// Fold results into per-category scores and counts. Pure.
pub fn aggregate(results: &[IngestedResult], catalog: &Catalog) -> Aggregation {
    let mut tallies: BTreeMap<i64, (&Category, Tally)> = catalog
        .categories()
        .map(|c| (c.id, (c, Tally::fresh())))
        .collect();
    let mut severity = SeverityTally::default();
    let mut skipped = 0;

    for result in results {
        let Some(category) = resolve_category_or_skip(catalog, result) else {
            skipped += 1;
            continue;
        };
        let Some((_, tally)) = tallies.get_mut(&category.id) else {
            skipped += 1;
            continue;
        };

        tally.issue_count += 1;
        match result.status {
            CheckStatus::Passed => tally.passed_count += 1,
            CheckStatus::Warning => tally.warning_count += 1,
            CheckStatus::Error => tally.error_count += 1,
        }
        if result.status != CheckStatus::Passed {
            match result.severity.unwrap_or(Severity::Low) {
                Severity::High => severity.high += 1,
                Severity::Medium => severity.medium += 1,
                Severity::Low => severity.low += 1,
            }
        }
        // Saturating keeps the running score clamped at zero.
        tally.score = tally
            .score
            .saturating_sub(severity_deduction_or_default(result.status, result.severity));
    }

    let category_scores = tallies
        .into_values()
        .filter(|(_, t)| t.issue_count > 0)
        .map(|(category, t)| CategoryScore {
            category_id: category.id,
            category_slug: category.slug.clone(),
            score: t.score.min(MAX_CATEGORY_SCORE) as u8,
            issue_count: t.issue_count,
            passed_count: t.passed_count,
            warning_count: t.warning_count,
            error_count: t.error_count,
        })
        .collect();

    Aggregation {
        category_scores,
        severity,
        skipped,
    }
}
