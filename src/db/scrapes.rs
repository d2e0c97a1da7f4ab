use crate::domain::ReconcileSummary;
use crate::errors::AppError;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};

#[derive(Debug)]
pub struct ScrapeRun {
    pub id: i64,
    pub started_at: NaiveDateTime,
    pub finished_at: Option<NaiveDateTime>,
    pub pages_fetched: Option<i64>,
    pub listings_seen: Option<i64>,
    pub inserted: Option<i64>,
    pub updated: Option<i64>,
    pub price_changed: Option<i64>,
    pub errors: Option<i64>,
    pub success: bool,
    pub error_message: Option<String>,
}

/// How a run ended, written back onto its `scrape_runs` row.
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub pages_fetched: u32,
    pub listings_seen: usize,
    pub summary: ReconcileSummary,
    pub error: Option<String>,
}

pub fn start_scrape_run(conn: &Connection, now: NaiveDateTime) -> Result<i64, AppError> {
    conn.execute(
        "INSERT INTO scrape_runs (started_at, success) VALUES (?, 0)",
        params![now],
    )?;
    Ok(conn.last_insert_rowid())
}

/// A run succeeds when it carries no error message.
pub fn end_scrape_run(
    conn: &Connection,
    run_id: i64,
    now: NaiveDateTime,
    outcome: &RunOutcome,
) -> Result<(), AppError> {
    let s = &outcome.summary;
    conn.execute(
        "UPDATE scrape_runs SET finished_at = ?, pages_fetched = ?, listings_seen = ?, inserted = ?, updated = ?, price_changed = ?, errors = ?, success = ?, error_message = ? WHERE id = ?",
        params![
            now,
            outcome.pages_fetched,
            outcome.listings_seen as i64,
            s.inserted as i64,
            s.updated as i64,
            s.price_changed as i64,
            s.errors as i64,
            outcome.error.is_none(),
            outcome.error,
            run_id
        ],
    )?;
    Ok(())
}

pub fn get_recent_scrapes(conn: &Connection) -> Result<Vec<ScrapeRun>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, started_at, finished_at, pages_fetched, listings_seen, inserted, updated, price_changed, errors, success, error_message FROM scrape_runs ORDER BY started_at DESC, id DESC LIMIT 50",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(ScrapeRun {
            id: row.get(0)?,
            started_at: row.get(1)?,
            finished_at: row.get(2)?,
            pages_fetched: row.get(3)?,
            listings_seen: row.get(4)?,
            inserted: row.get(5)?,
            updated: row.get(6)?,
            price_changed: row.get(7)?,
            errors: row.get(8)?,
            success: row.get(9)?,
            error_message: row.get(10)?,
        })
    })?;

    let mut runs = Vec::new();
    for r in rows {
        runs.push(r?);
    }
    Ok(runs)
}
