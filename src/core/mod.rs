pub mod pipeline;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::BandConfig;

/// Outcome of a single check on an audited site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Passed,
    Warning,
    Error,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Passed => "passed",
            CheckStatus::Warning => "warning",
            CheckStatus::Error => "error",
        }
    }
}

impl FromStr for CheckStatus {
    type Err = String;

    /// Strict: anything other than the three known statuses, spelled exactly,
    /// is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "passed" => Ok(CheckStatus::Passed),
            "warning" => Ok(CheckStatus::Warning),
            "error" => Ok(CheckStatus::Error),
            _ => Err(s.to_string()),
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Lenient parse. Returns `None` for anything that is not exactly one of
    /// the known severities so callers can fall back to the low tier instead
    /// of failing.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        match raw {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

/// Lifecycle state of an audit. Owned by the surrounding system; the engine
/// only ever moves an audit to `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Pending => "pending",
            AuditStatus::Running => "running",
            AuditStatus::Completed => "completed",
            AuditStatus::Failed => "failed",
        }
    }
}

impl FromStr for AuditStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AuditStatus::Pending),
            "running" => Ok(AuditStatus::Running),
            "completed" => Ok(AuditStatus::Completed),
            "failed" => Ok(AuditStatus::Failed),
            other => Err(format!("unknown audit status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Audit {
    pub id: String,
    pub website_id: String,
    pub url: String,
    pub status: AuditStatus,
    pub total_pages: u32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A check outcome as written by the crawler, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCheckResult {
    /// May be left empty in import files; the importer fills it in.
    #[serde(default)]
    pub audit_id: String,
    pub check_id: i64,
    pub status: String,
    #[serde(default)]
    pub severity: Option<String>,
}

/// Derived health of one category within one audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category_id: i64,
    pub category_slug: String,
    /// 0-100, starts at 100 and only decreases.
    pub score: u8,
    /// Every scored result, passes included.
    pub issue_count: u32,
    pub passed_count: u32,
    pub warning_count: u32,
    pub error_count: u32,
}

/// Identity of a persisted summary row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SummaryId(pub i64);

impl fmt::Display for SummaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One summary per audit; upserted on `audit_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSummary {
    pub audit_id: String,
    pub overall_score: u8,
    pub total_pages: u32,
    pub total_issues: u32,
    pub high_severity_issues: u32,
    pub medium_severity_issues: u32,
    pub low_severity_issues: u32,
    pub completed_at: DateTime<Utc>,
}

/// A summary as read back from storage, with its category rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub id: SummaryId,
    pub summary: AuditSummary,
    pub categories: Vec<CategoryScore>,
}

/// Coarse label for an overall score, used by dashboards and alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthBand {
    Good,
    NeedsImprovement,
    Poor,
}

impl HealthBand {
    pub fn from_score(score: u8, bands: &BandConfig) -> Self {
        if score >= bands.good {
            HealthBand::Good
        } else if score >= bands.needs_improvement {
            HealthBand::NeedsImprovement
        } else {
            HealthBand::Poor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HealthBand::Good => "good",
            HealthBand::NeedsImprovement => "needs improvement",
            HealthBand::Poor => "poor",
        }
    }
}
