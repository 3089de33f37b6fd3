use rusqlite::Connection;

pub fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS categories (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL,
            slug        TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS checks (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            category_id INTEGER NOT NULL REFERENCES categories(id),
            name        TEXT NOT NULL,
            weight      REAL NOT NULL DEFAULT 1.0,
            UNIQUE (category_id, name)
        );

        CREATE TABLE IF NOT EXISTS audits (
            id           TEXT PRIMARY KEY,
            website_id   TEXT NOT NULL,
            url          TEXT NOT NULL,
            status       TEXT NOT NULL,
            total_pages  INTEGER NOT NULL DEFAULT 0,
            created_at   TEXT NOT NULL,
            completed_at TEXT
        );

        -- Raw crawler output; status/severity are validated at ingestion.
        CREATE TABLE IF NOT EXISTS check_results (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            audit_id    TEXT NOT NULL,
            check_id    INTEGER NOT NULL,
            status      TEXT NOT NULL,
            severity    TEXT
        );

        CREATE TABLE IF NOT EXISTS audit_summaries (
            id                     INTEGER PRIMARY KEY AUTOINCREMENT,
            audit_id               TEXT NOT NULL UNIQUE,
            overall_score          INTEGER NOT NULL,
            total_pages            INTEGER NOT NULL,
            total_issues           INTEGER NOT NULL,
            high_severity_issues   INTEGER NOT NULL,
            medium_severity_issues INTEGER NOT NULL,
            low_severity_issues    INTEGER NOT NULL,
            completed_at           TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS category_scores (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            audit_summary_id INTEGER NOT NULL REFERENCES audit_summaries(id),
            category_id      INTEGER NOT NULL REFERENCES categories(id),
            score            INTEGER NOT NULL,
            issue_count      INTEGER NOT NULL,
            passed_count     INTEGER NOT NULL,
            warning_count    INTEGER NOT NULL,
            error_count      INTEGER NOT NULL,
            UNIQUE (audit_summary_id, category_id)
        );

        CREATE INDEX IF NOT EXISTS idx_check_results_audit ON check_results(audit_id);
        CREATE INDEX IF NOT EXISTS idx_audits_website ON audits(website_id, created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_summaries_completed ON audit_summaries(completed_at DESC);
        CREATE INDEX IF NOT EXISTS idx_summaries_score ON audit_summaries(overall_score);
        ",
    )?;
    Ok(())
}
