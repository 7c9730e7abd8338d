//! SQLite work ledger: the durable record of what has been checked.
//!
//! Every business record lives in one row keyed by `place_id`, carrying both
//! the directory metadata and the check columns. `check_state` drives the
//! resumable work loop: PENDING rows are eligible for dispatch, IN_PROGRESS
//! rows are claimed by a running task, DONE rows hold a finished result.
//! A crash leaves IN_PROGRESS rows behind; [`Ledger::recover_interrupted`]
//! folds them back to PENDING on the next start.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use strum_macros::{Display, EnumString};
use thiserror::Error;

use crate::models::Business;
use crate::status::{CheckResult, WebsiteStatus};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to open database at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("unrecognized {column} value in row {place_id}: {value}")]
    CorruptRow {
        column: &'static str,
        place_id: String,
        value: String,
    },
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
}

/// Work-loop state of one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum CheckState {
    #[strum(serialize = "PENDING")]
    Pending,
    #[strum(serialize = "IN_PROGRESS")]
    InProgress,
    #[strum(serialize = "DONE")]
    Done,
}

/// A unit of pending work handed to the governor.
#[derive(Debug, Clone)]
pub struct CheckTarget {
    pub place_id: String,
    /// `None` means the record has no website; the check short-circuits.
    pub url: Option<String>,
}

/// Aggregate counts for the end-of-run report.
#[derive(Debug, Default)]
pub struct LedgerStats {
    pub total: u64,
    pub done: u64,
    pub pending: u64,
    pub in_progress: u64,
    /// (status string, count), sorted by count descending.
    pub by_status: Vec<(String, u64)>,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS businesses (
    place_id         TEXT PRIMARY KEY,
    name             TEXT NOT NULL,
    address          TEXT NOT NULL DEFAULT '',
    phone            TEXT NOT NULL DEFAULT '',
    website          TEXT,
    rating           REAL NOT NULL DEFAULT 0,
    review_count     INTEGER NOT NULL DEFAULT 0,
    category         TEXT NOT NULL DEFAULT '',
    check_state      TEXT NOT NULL DEFAULT 'PENDING',
    status           TEXT,
    status_code      INTEGER,
    reason           TEXT,
    response_time_ms REAL,
    final_url        TEXT,
    checked_at       TEXT,
    created_at       TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at       TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_businesses_check_state ON businesses (check_state);
CREATE INDEX IF NOT EXISTS idx_businesses_status ON businesses (status);
";

/// Handle to the ledger database. Cheap to clone via the inner pool.
#[derive(Clone)]
pub struct Ledger {
    pool: SqlitePool,
}

impl Ledger {
    /// Opens (creating if missing) the ledger at `path` with WAL journaling
    /// and applies the schema.
    pub async fn open(path: &Path) -> Result<Self, LedgerError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|source| LedgerError::Open {
                path: path.display().to_string(),
                source,
            })?;

        let ledger = Ledger { pool };
        ledger.init_schema().await?;
        Ok(ledger)
    }

    /// In-memory ledger for tests. A single connection, since each SQLite
    /// `:memory:` connection is its own database.
    pub async fn open_in_memory() -> Result<Self, LedgerError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let ledger = Ledger { pool };
        ledger.init_schema().await?;
        Ok(ledger)
    }

    async fn init_schema(&self) -> Result<(), LedgerError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Resets rows stranded IN_PROGRESS by a previous crash back to PENDING.
    /// Returns how many rows were recovered.
    pub async fn recover_interrupted(&self) -> Result<u64, LedgerError> {
        let result = sqlx::query(
            "UPDATE businesses
             SET check_state = 'PENDING', updated_at = datetime('now')
             WHERE check_state = 'IN_PROGRESS'",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Inserts a business record, or refreshes its metadata if the place_id
    /// already exists. Existing check columns are never touched, so a re-run
    /// over the same input keeps finished results. Returns whether the row
    /// was newly inserted.
    pub async fn upsert_business(&self, business: &Business) -> Result<bool, LedgerError> {
        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM businesses WHERE place_id = ?1")
                .bind(&business.place_id)
                .fetch_one(&self.pool)
                .await?;

        sqlx::query(
            "INSERT INTO businesses
                 (place_id, name, address, phone, website, rating, review_count, category)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (place_id) DO UPDATE SET
                 name = excluded.name,
                 address = excluded.address,
                 phone = excluded.phone,
                 website = excluded.website,
                 rating = excluded.rating,
                 review_count = excluded.review_count,
                 category = excluded.category,
                 updated_at = datetime('now')
             WHERE businesses.check_state != 'IN_PROGRESS'",
        )
        .bind(&business.place_id)
        .bind(&business.name)
        .bind(&business.address)
        .bind(&business.phone)
        .bind(&business.website)
        .bind(business.rating)
        .bind(business.review_count)
        .bind(&business.category)
        .execute(&self.pool)
        .await?;

        Ok(existing == 0)
    }

    /// Rows still awaiting a check, in insertion order.
    pub async fn fetch_pending(&self) -> Result<Vec<CheckTarget>, LedgerError> {
        let rows = sqlx::query(
            "SELECT place_id, website FROM businesses
             WHERE check_state = 'PENDING'
             ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CheckTarget {
                place_id: row.get("place_id"),
                url: row.get("website"),
            })
            .collect())
    }

    /// Claims a PENDING row for checking. Returns false when the row was
    /// already claimed or finished, so duplicate dispatch is impossible even
    /// if the same target is queued twice.
    pub async fn mark_in_progress(&self, place_id: &str) -> Result<bool, LedgerError> {
        let result = sqlx::query(
            "UPDATE businesses
             SET check_state = 'IN_PROGRESS', updated_at = datetime('now')
             WHERE place_id = ?1 AND check_state = 'PENDING'",
        )
        .bind(place_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Records a finished check and moves the row to DONE.
    pub async fn mark_done(
        &self,
        place_id: &str,
        result: &CheckResult,
    ) -> Result<(), LedgerError> {
        sqlx::query(
            "UPDATE businesses
             SET check_state = 'DONE',
                 status = ?2,
                 status_code = ?3,
                 reason = ?4,
                 response_time_ms = ?5,
                 final_url = ?6,
                 checked_at = ?7,
                 updated_at = datetime('now')
             WHERE place_id = ?1",
        )
        .bind(place_id)
        .bind(result.status.to_string())
        .bind(result.status_code.map(i64::from))
        .bind(&result.reason)
        .bind(result.response_time_ms)
        .bind(&result.final_url)
        .bind(result.checked_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Loads every row with its check result (None for unchecked rows), for
    /// filtering and export.
    pub async fn load_all(&self) -> Result<Vec<(Business, Option<CheckResult>)>, LedgerError> {
        let rows = sqlx::query(
            "SELECT place_id, name, address, phone, website, rating, review_count,
                    category, status, status_code, reason, response_time_ms,
                    final_url, checked_at
             FROM businesses ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let place_id: String = row.get("place_id");
            let business = Business {
                place_id: place_id.clone(),
                name: row.get("name"),
                address: row.get("address"),
                phone: row.get("phone"),
                website: row.get("website"),
                rating: row.get("rating"),
                review_count: row.get("review_count"),
                category: row.get("category"),
            };

            let status_text: Option<String> = row.get("status");
            let result = match status_text {
                Some(text) => {
                    let status = WebsiteStatus::from_str(&text).map_err(|_| {
                        LedgerError::CorruptRow {
                            column: "status",
                            place_id: place_id.clone(),
                            value: text.clone(),
                        }
                    })?;
                    let checked_at: Option<String> = row.get("checked_at");
                    let checked_at = checked_at
                        .as_deref()
                        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(Utc::now);
                    Some(CheckResult {
                        status,
                        status_code: row
                            .get::<Option<i64>, _>("status_code")
                            .map(|c| c as u16),
                        reason: row.get::<Option<String>, _>("reason").unwrap_or_default(),
                        response_time_ms: row
                            .get::<Option<f64>, _>("response_time_ms")
                            .unwrap_or(0.0),
                        final_url: row.get("final_url"),
                        checked_at,
                    })
                }
                None => None,
            };
            records.push((business, result));
        }
        Ok(records)
    }

    /// Aggregate counts for the end-of-run report.
    pub async fn statistics(&self) -> Result<LedgerStats, LedgerError> {
        let mut stats = LedgerStats::default();

        let states = sqlx::query(
            "SELECT check_state, COUNT(*) AS n FROM businesses GROUP BY check_state",
        )
        .fetch_all(&self.pool)
        .await?;
        for row in states {
            let state: String = row.get("check_state");
            let n: i64 = row.get("n");
            let n = n as u64;
            stats.total += n;
            match CheckState::from_str(&state) {
                Ok(CheckState::Pending) => stats.pending = n,
                Ok(CheckState::InProgress) => stats.in_progress = n,
                Ok(CheckState::Done) => stats.done = n,
                Err(_) => log::warn!("unrecognized check_state in database: {state}"),
            }
        }

        let statuses = sqlx::query(
            "SELECT status, COUNT(*) AS n FROM businesses
             WHERE status IS NOT NULL
             GROUP BY status ORDER BY n DESC, status",
        )
        .fetch_all(&self.pool)
        .await?;
        stats.by_status = statuses
            .into_iter()
            .map(|row| (row.get::<String, _>("status"), row.get::<i64, _>("n") as u64))
            .collect();

        Ok(stats)
    }
}
