//! Schema versioning through SQLite's `user_version` pragma.

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// Applied in order; a database at version N skips everything up to N.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_jobs_table",
        sql: include_str!("sql/001_create_jobs.sql"),
    },
    Migration {
        version: 2,
        description: "index_jobs_by_created_at",
        sql: include_str!("sql/002_index_jobs_created_at.sql"),
    },
];

pub fn schema_version(conn: &Connection) -> Result<u32, DatabaseError> {
    Ok(conn.query_row("PRAGMA user_version", [], |r| r.get(0))?)
}

/// Brings the schema up to date. Each step commits together with its
/// version bump. Returns how many steps ran.
pub fn run_all(conn: &Connection) -> Result<usize, DatabaseError> {
    let current = schema_version(conn)?;
    let latest = MIGRATIONS.last().map_or(0, |m| m.version);
    if current > latest {
        return Err(DatabaseError::SchemaTooNew {
            found: current,
            supported: latest,
        });
    }

    let mut applied = 0;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        log::info!(
            "Applying schema v{}: {}",
            migration.version,
            migration.description
        );
        let step = |reason: rusqlite::Error| DatabaseError::Migration {
            version: migration.version,
            reason: reason.to_string(),
        };

        let tx = conn.unchecked_transaction().map_err(step)?;
        tx.execute_batch(migration.sql).map_err(step)?;
        tx.pragma_update(None, "user_version", migration.version)
            .map_err(step)?;
        tx.commit().map_err(step)?;
        applied += 1;
    }

    Ok(applied)
}
