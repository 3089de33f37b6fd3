pub mod schema;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::catalog::{self, Catalog, Category, Check, SeedEntry};
use crate::core::{
    Audit, AuditStatus, AuditSummary, CategoryScore, RawCheckResult, SummaryId, SummaryRecord,
};
use crate::error::StoreError;
use crate::store::{AuditStore, ResultSource, SummaryStore};

pub struct Database {
    conn: Connection,
}

/// Thread-safe wrapper around Database.
#[derive(Clone)]
pub struct SharedDatabase {
    inner: Arc<Mutex<Database>>,
}

/// Fixed-width RFC 3339 so stored timestamps sort lexically.
fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl SharedDatabase {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self::wrap(Database::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self::wrap(Database::open_in_memory()?))
    }

    fn wrap(db: Database) -> Self {
        Self {
            inner: Arc::new(Mutex::new(db)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Insert or rename a category by slug.
    pub fn insert_category(&self, slug: &str, name: &str) -> Result<i64, StoreError> {
        self.lock()?.insert_category(slug, name)
    }

    pub fn insert_check(&self, category_id: i64, name: &str, weight: f64) -> Result<i64, StoreError> {
        self.lock()?.insert_check(category_id, name, weight)
    }

    /// Load seed entries in a single transaction. Returns the number of checks written.
    pub fn seed_catalog(&self, entries: &[SeedEntry]) -> Result<usize, StoreError> {
        self.lock()?.seed_catalog(entries)
    }

    /// Bulk-load catalog entries from a CSV file.
    pub fn load_catalog_from_csv(&self, path: &Path) -> Result<usize, StoreError> {
        let content = std::fs::read_to_string(path)?;
        let entries = catalog::parse_seed_csv(&content)
            .map_err(|(line, reason)| StoreError::Malformed { line, reason })?;
        self.seed_catalog(&entries)
    }

    pub fn insert_audit(&self, audit: &Audit) -> Result<(), StoreError> {
        self.lock()?.insert_audit(audit)
    }

    /// Batch-store raw results in a single transaction.
    pub fn store_results_batch(&self, results: &[RawCheckResult]) -> Result<(), StoreError> {
        self.lock()?.store_results_batch(results)
    }

    pub fn get_summary(&self, audit_id: &str) -> Result<Option<SummaryRecord>, StoreError> {
        self.lock()?.get_summary(audit_id)
    }

    /// Most recent summaries for a website, newest first.
    pub fn recent_summaries_for_website(
        &self,
        website_id: &str,
        limit: usize,
    ) -> Result<Vec<SummaryRecord>, StoreError> {
        self.lock()?.recent_summaries_for_website(website_id, limit)
    }

    pub fn summaries_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SummaryRecord>, StoreError> {
        self.lock()?.summaries_between(from, to)
    }

    /// Summaries at or below `max_score`, lowest first.
    pub fn summaries_below_score(&self, max_score: u8, limit: usize) -> Result<Vec<SummaryRecord>, StoreError> {
        self.lock()?.summaries_below_score(max_score, limit)
    }

    pub fn summary_count(&self) -> Result<usize, StoreError> {
        self.lock()?.summary_count()
    }
}

impl ResultSource for SharedDatabase {
    fn load_catalog(&self) -> Result<Catalog, StoreError> {
        self.lock()?.load_catalog()
    }

    fn load_results(&self, audit_id: &str) -> Result<Vec<RawCheckResult>, StoreError> {
        self.lock()?.load_results(audit_id)
    }
}

impl AuditStore for SharedDatabase {
    fn find_audit(&self, audit_id: &str) -> Result<Option<Audit>, StoreError> {
        self.lock()?.find_audit(audit_id)
    }

    fn mark_completed(&self, audit_id: &str, completed_at: DateTime<Utc>) -> Result<(), StoreError> {
        self.lock()?.mark_completed(audit_id, completed_at)
    }
}

impl SummaryStore for SharedDatabase {
    fn upsert_summary(&self, summary: &AuditSummary) -> Result<SummaryId, StoreError> {
        let db = self.lock()?;
        Ok(upsert_summary_on(&db.conn, summary)?)
    }

    fn upsert_category_scores(
        &self,
        summary_id: SummaryId,
        scores: &[CategoryScore],
    ) -> Result<(), StoreError> {
        let db = self.lock()?;
        let tx = db.conn.unchecked_transaction()?;
        upsert_category_scores_on(&tx, summary_id, scores)?;
        tx.commit()?;
        Ok(())
    }

    fn commit_summary(
        &self,
        summary: &AuditSummary,
        scores: &[CategoryScore],
    ) -> Result<SummaryId, StoreError> {
        self.lock()?.commit_summary(summary, scores)
    }
}

fn upsert_summary_on(conn: &Connection, s: &AuditSummary) -> rusqlite::Result<SummaryId> {
    conn.query_row(
        "INSERT INTO audit_summaries (audit_id, overall_score, total_pages, total_issues,
             high_severity_issues, medium_severity_issues, low_severity_issues, completed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(audit_id) DO UPDATE SET
             overall_score = excluded.overall_score,
             total_pages = excluded.total_pages,
             total_issues = excluded.total_issues,
             high_severity_issues = excluded.high_severity_issues,
             medium_severity_issues = excluded.medium_severity_issues,
             low_severity_issues = excluded.low_severity_issues,
             completed_at = excluded.completed_at
         RETURNING id",
        rusqlite::params![
            s.audit_id,
            s.overall_score,
            s.total_pages,
            s.total_issues,
            s.high_severity_issues,
            s.medium_severity_issues,
            s.low_severity_issues,
            format_ts(&s.completed_at),
        ],
        |row| row.get(0).map(SummaryId),
    )
}

/// Upsert every row of the batch and drop rows for categories no longer
/// present, so the stored set always equals the latest computation.
fn upsert_category_scores_on(
    conn: &Connection,
    summary_id: SummaryId,
    scores: &[CategoryScore],
) -> rusqlite::Result<()> {
    {
        let mut stmt = conn.prepare_cached(
            "INSERT INTO category_scores (audit_summary_id, category_id, score, issue_count,
                 passed_count, warning_count, error_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(audit_summary_id, category_id) DO UPDATE SET
                 score = excluded.score,
                 issue_count = excluded.issue_count,
                 passed_count = excluded.passed_count,
                 warning_count = excluded.warning_count,
                 error_count = excluded.error_count",
        )?;
        for c in scores {
            stmt.execute(rusqlite::params![
                summary_id.0,
                c.category_id,
                c.score,
                c.issue_count,
                c.passed_count,
                c.warning_count,
                c.error_count,
            ])?;
        }
    }

    let existing: Vec<i64> = {
        let mut stmt =
            conn.prepare_cached("SELECT category_id FROM category_scores WHERE audit_summary_id = ?1")?;
        let rows = stmt.query_map(rusqlite::params![summary_id.0], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<_>>()?
    };
    for category_id in existing {
        if !scores.iter().any(|c| c.category_id == category_id) {
            conn.execute(
                "DELETE FROM category_scores WHERE audit_summary_id = ?1 AND category_id = ?2",
                rusqlite::params![summary_id.0, category_id],
            )?;
        }
    }
    Ok(())
}

const SUMMARY_COLUMNS: &str = "s.id, s.audit_id, s.overall_score, s.total_pages, s.total_issues,
     s.high_severity_issues, s.medium_severity_issues, s.low_severity_issues, s.completed_at";

impl Database {
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, rusqlite::Error> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    pub fn insert_category(&self, slug: &str, name: &str) -> Result<i64, StoreError> {
        Ok(insert_category_on(&self.conn, slug, name)?)
    }

    pub fn insert_check(&self, category_id: i64, name: &str, weight: f64) -> Result<i64, StoreError> {
        Ok(insert_check_on(&self.conn, category_id, name, weight)?)
    }

    pub fn seed_catalog(&self, entries: &[SeedEntry]) -> Result<usize, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        for e in entries {
            let category_id = insert_category_on(&tx, &e.category_slug, &e.category_name)?;
            insert_check_on(&tx, category_id, &e.check_name, e.check_weight)?;
        }
        tx.commit()?;
        tracing::info!(checks = entries.len(), "Catalog seeded");
        Ok(entries.len())
    }

    pub fn load_catalog(&self) -> Result<Catalog, StoreError> {
        let mut stmt = self.conn.prepare("SELECT id, name, slug FROM categories")?;
        let categories = stmt
            .query_map([], |row| {
                Ok(Category {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    slug: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = self.conn.prepare("SELECT id, category_id, name, weight FROM checks")?;
        let checks = stmt
            .query_map([], |row| {
                Ok(Check {
                    id: row.get(0)?,
                    category_id: row.get(1)?,
                    name: row.get(2)?,
                    weight: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Catalog::new(categories, checks))
    }

    pub fn insert_audit(&self, audit: &Audit) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO audits (id, website_id, url, status, total_pages, created_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                audit.id,
                audit.website_id,
                audit.url,
                audit.status.as_str(),
                audit.total_pages,
                format_ts(&audit.created_at),
                audit.completed_at.as_ref().map(format_ts),
            ],
        )?;
        Ok(())
    }

    pub fn find_audit(&self, audit_id: &str) -> Result<Option<Audit>, StoreError> {
        let audit = self
            .conn
            .query_row(
                "SELECT id, website_id, url, status, total_pages, created_at, completed_at
                 FROM audits WHERE id = ?1",
                rusqlite::params![audit_id],
                |row| {
                    let status: String = row.get(3)?;
                    let status = status.parse::<AuditStatus>().map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into())
                    })?;
                    let completed_at: Option<String> = row.get(6)?;
                    Ok(Audit {
                        id: row.get(0)?,
                        website_id: row.get(1)?,
                        url: row.get(2)?,
                        status,
                        total_pages: row.get(4)?,
                        created_at: parse_ts(5, &row.get::<_, String>(5)?)?,
                        completed_at: completed_at.as_deref().map(|s| parse_ts(6, s)).transpose()?,
                    })
                },
            )
            .optional()?;
        Ok(audit)
    }

    pub fn mark_completed(&self, audit_id: &str, completed_at: DateTime<Utc>) -> Result<(), StoreError> {
        let updated = self.conn.execute(
            "UPDATE audits SET status = ?2, completed_at = ?3 WHERE id = ?1",
            rusqlite::params![audit_id, AuditStatus::Completed.as_str(), format_ts(&completed_at)],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("audit '{audit_id}'")));
        }
        Ok(())
    }

    pub fn store_results_batch(&self, results: &[RawCheckResult]) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO check_results (audit_id, check_id, status, severity) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for r in results {
                stmt.execute(rusqlite::params![r.audit_id, r.check_id, r.status, r.severity])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Raw results in insertion order.
    pub fn load_results(&self, audit_id: &str) -> Result<Vec<RawCheckResult>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT audit_id, check_id, status, severity FROM check_results WHERE audit_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(rusqlite::params![audit_id], |row| {
            Ok(RawCheckResult {
                audit_id: row.get(0)?,
                check_id: row.get(1)?,
                status: row.get(2)?,
                severity: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Summary upsert and category upserts in one transaction.
    pub fn commit_summary(
        &self,
        summary: &AuditSummary,
        scores: &[CategoryScore],
    ) -> Result<SummaryId, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let id = upsert_summary_on(&tx, summary)?;
        upsert_category_scores_on(&tx, id, scores)?;
        tx.commit()?;
        Ok(id)
    }

    fn row_to_summary(row: &rusqlite::Row) -> rusqlite::Result<(SummaryId, AuditSummary)> {
        Ok((
            SummaryId(row.get(0)?),
            AuditSummary {
                audit_id: row.get(1)?,
                overall_score: row.get(2)?,
                total_pages: row.get(3)?,
                total_issues: row.get(4)?,
                high_severity_issues: row.get(5)?,
                medium_severity_issues: row.get(6)?,
                low_severity_issues: row.get(7)?,
                completed_at: parse_ts(8, &row.get::<_, String>(8)?)?,
            },
        ))
    }

    fn category_scores_for(&self, summary_id: SummaryId) -> rusqlite::Result<Vec<CategoryScore>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT cs.category_id, c.slug, cs.score, cs.issue_count, cs.passed_count,
                    cs.warning_count, cs.error_count
             FROM category_scores cs JOIN categories c ON c.id = cs.category_id
             WHERE cs.audit_summary_id = ?1 ORDER BY cs.category_id",
        )?;
        let rows = stmt.query_map(rusqlite::params![summary_id.0], |row| {
            Ok(CategoryScore {
                category_id: row.get(0)?,
                category_slug: row.get(1)?,
                score: row.get(2)?,
                issue_count: row.get(3)?,
                passed_count: row.get(4)?,
                warning_count: row.get(5)?,
                error_count: row.get(6)?,
            })
        })?;
        rows.collect()
    }

    fn query_summaries(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<SummaryRecord>, StoreError> {
        let heads = {
            let mut stmt = self.conn.prepare(sql)?;
            let rows = stmt.query_map(params, Self::row_to_summary)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        let mut records = Vec::with_capacity(heads.len());
        for (id, summary) in heads {
            records.push(SummaryRecord {
                id,
                summary,
                categories: self.category_scores_for(id)?,
            });
        }
        Ok(records)
    }

    pub fn get_summary(&self, audit_id: &str) -> Result<Option<SummaryRecord>, StoreError> {
        let sql = format!("SELECT {SUMMARY_COLUMNS} FROM audit_summaries s WHERE s.audit_id = ?1");
        Ok(self
            .query_summaries(&sql, rusqlite::params![audit_id])?
            .into_iter()
            .next())
    }

    pub fn recent_summaries_for_website(
        &self,
        website_id: &str,
        limit: usize,
    ) -> Result<Vec<SummaryRecord>, StoreError> {
        let sql = format!(
            "SELECT {SUMMARY_COLUMNS} FROM audit_summaries s JOIN audits a ON a.id = s.audit_id
             WHERE a.website_id = ?1 ORDER BY s.completed_at DESC, s.id DESC LIMIT ?2"
        );
        self.query_summaries(&sql, rusqlite::params![website_id, limit as i64])
    }

    pub fn summaries_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SummaryRecord>, StoreError> {
        let sql = format!(
            "SELECT {SUMMARY_COLUMNS} FROM audit_summaries s
             WHERE s.completed_at >= ?1 AND s.completed_at <= ?2 ORDER BY s.completed_at DESC"
        );
        self.query_summaries(&sql, rusqlite::params![format_ts(&from), format_ts(&to)])
    }

    pub fn summaries_below_score(&self, max_score: u8, limit: usize) -> Result<Vec<SummaryRecord>, StoreError> {
        let sql = format!(
            "SELECT {SUMMARY_COLUMNS} FROM audit_summaries s
             WHERE s.overall_score <= ?1 ORDER BY s.overall_score ASC, s.id ASC LIMIT ?2"
        );
        self.query_summaries(&sql, rusqlite::params![max_score, limit as i64])
    }

    pub fn summary_count(&self) -> Result<usize, StoreError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM audit_summaries", [], |row| {
                row.get::<_, i64>(0).map(|c| c as usize)
            })?)
    }
}

fn insert_category_on(conn: &Connection, slug: &str, name: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "INSERT INTO categories (slug, name) VALUES (?1, ?2)
         ON CONFLICT(slug) DO UPDATE SET name = excluded.name
         RETURNING id",
        rusqlite::params![slug, name],
        |row| row.get(0),
    )
}

fn insert_check_on(conn: &Connection, category_id: i64, name: &str, weight: f64) -> rusqlite::Result<i64> {
    conn.query_row(
        "INSERT INTO checks (category_id, name, weight) VALUES (?1, ?2, ?3)
         ON CONFLICT(category_id, name) DO UPDATE SET weight = excluded.weight
         RETURNING id",
        rusqlite::params![category_id, name, weight],
        |row| row.get(0),
    )
}
