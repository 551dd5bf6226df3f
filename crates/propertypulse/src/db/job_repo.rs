//! Persistence for the `jobs` table.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw job row. `snapshot` and `events` hold JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRow {
    pub id: String,
    pub url: String,
    pub status: String,
    pub address: Option<String>,
    pub price_text: Option<String>,
    pub snapshot: String,
    pub events: String,
    pub event_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            url: row.get("url")?,
            status: row.get("status")?,
            address: row.get("address")?,
            price_text: row.get("price_text")?,
            snapshot: row.get("snapshot")?,
            events: row.get("events")?,
            event_count: row.get("event_count")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Inserts or updates a job. A row is never replaced by one carrying fewer
/// events, so a stale writer cannot roll a job back.
pub fn upsert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, url, status, address, price_text, snapshot, events,
             event_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                address = excluded.address,
                price_text = excluded.price_text,
                snapshot = excluded.snapshot,
                events = excluded.events,
                event_count = excluded.event_count,
                updated_at = excluded.updated_at
             WHERE excluded.event_count >= jobs.event_count",
            params![
                job.id,
                job.url,
                job.status,
                job.address,
                job.price_text,
                job.snapshot,
                job.events,
                job.event_count,
                job.created_at,
                job.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Every stored job, oldest first.
pub fn load_all(db: &Database) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs ORDER BY created_at ASC, id ASC")?;
        let rows = stmt
            .query_map([], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Deletes a job. Returns whether a row was removed.
pub fn delete(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    })
}
