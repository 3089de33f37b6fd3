use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::SummaryRecord;

/// Change between two summaries of the same website.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryDelta {
    pub previous_audit_id: String,
    pub current_audit_id: String,
    pub overall_delta: i16,
    /// Slug to score change, for categories scored in both audits.
    pub category_deltas: BTreeMap<String, i16>,
    pub appeared: Vec<String>,
    pub disappeared: Vec<String>,
}

pub fn compare(previous: &SummaryRecord, current: &SummaryRecord) -> SummaryDelta {
    let before: BTreeMap<&str, u8> = previous
        .categories
        .iter()
        .map(|c| (c.category_slug.as_str(), c.score))
        .collect();
    let after: BTreeMap<&str, u8> = current
        .categories
        .iter()
        .map(|c| (c.category_slug.as_str(), c.score))
        .collect();

    let mut category_deltas = BTreeMap::new();
    let mut appeared = Vec::new();
    for (slug, &score) in &after {
        match before.get(slug) {
            Some(&old) => {
                category_deltas.insert((*slug).to_string(), i16::from(score) - i16::from(old));
            }
            None => appeared.push((*slug).to_string()),
        }
    }
    let disappeared = before
        .keys()
        .filter(|slug| !after.contains_key(*slug))
        .map(|slug| (*slug).to_string())
        .collect();

    SummaryDelta {
        previous_audit_id: previous.summary.audit_id.clone(),
        current_audit_id: current.summary.audit_id.clone(),
        overall_delta: i16::from(current.summary.overall_score)
            - i16::from(previous.summary.overall_score),
        category_deltas,
        appeared,
        disappeared,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AuditSummary, CategoryScore, SummaryId};
    use chrono::Utc;

    fn record(audit_id: &str, overall: u8, cats: &[(&str, u8)]) -> SummaryRecord {
        SummaryRecord {
            id: SummaryId(1),
            summary: AuditSummary {
                audit_id: audit_id.into(),
                overall_score: overall,
                total_pages: 1,
                total_issues: 0,
                high_severity_issues: 0,
                medium_severity_issues: 0,
                low_severity_issues: 0,
                completed_at: Utc::now(),
            },
            categories: cats
                .iter()
                .enumerate()
                .map(|(i, (slug, score))| CategoryScore {
                    category_id: i as i64,
                    category_slug: (*slug).to_string(),
                    score: *score,
                    issue_count: 1,
                    passed_count: 1,
                    warning_count: 0,
                    error_count: 0,
                })
                .collect(),
        }
    }

    #[test]
    fn deltas_between_audits() {
        let prev = record("a1", 90, &[("seo", 95), ("performance", 85), ("mobile", 70)]);
        let curr = record("a2", 84, &[("seo", 80), ("performance", 88), ("security", 90)]);
        let delta = compare(&prev, &curr);
        assert_eq!(delta.overall_delta, -6);
        assert_eq!(delta.category_deltas["seo"], -15);
        assert_eq!(delta.category_deltas["performance"], 3);
        assert_eq!(delta.appeared, vec!["security".to_string()]);
        assert_eq!(delta.disappeared, vec!["mobile".to_string()]);
    }

    #[test]
    fn identical_summaries_have_no_change() {
        let a = record("a1", 75, &[("seo", 75)]);
        let delta = compare(&a, &a);
        assert_eq!(delta.overall_delta, 0);
        assert_eq!(delta.category_deltas["seo"], 0);
        assert!(delta.appeared.is_empty() && delta.disappeared.is_empty());
    }
}
