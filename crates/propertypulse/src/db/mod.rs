//! SQLite persistence for jobs and their event logs.
//!
//! A single connection sits behind a mutex; every statement goes through
//! [`Database::with_conn`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::Connection;

pub mod error;
pub mod job_repo;
pub mod migrations;

pub use error::DatabaseError;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a [`Database`] keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    File(PathBuf),
    Memory,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::File(path) => write!(f, "{}", path.display()),
            Location::Memory => f.write_str(":memory:"),
        }
    }
}

/// Shared handle to the job database. Clones share one connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    location: Location,
}

impl Database {
    /// Opens or creates the file at `path`, creating missing parent
    /// directories, and brings the schema up to date.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| DatabaseError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::prepare(conn, Location::File(path.to_path_buf()))
    }

    /// A private database that disappears with the last clone.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::prepare(Connection::open_in_memory()?, Location::Memory)
    }

    fn prepare(conn: Connection, location: Location) -> Result<Self, DatabaseError> {
        let applied = migrations::run_all(&conn)?;
        log::info!(
            "Job database ready at {} ({} migrations applied)",
            location,
            applied
        );
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location,
        })
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Runs `f` with exclusive access to the connection. A panic in an
    /// earlier caller does not lock the database out.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.lock();
        f(&conn)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job database lock was poisoned; continuing");
                poisoned.into_inner()
            }
        }
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// `~/.propertypulse/data/jobs.db`, when a home directory exists.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".propertypulse").join("data").join("jobs.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_count(db: &Database) -> u32 {
        db.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM jobs", [], |r| r.get(0))?))
            .unwrap()
    }

    #[test]
    fn test_in_memory_has_empty_jobs_table() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.location(), &Location::Memory);
        assert_eq!(job_count(&db), 0);
    }

    #[test]
    fn test_file_database_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("jobs.db");
        let db = Database::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(db.location(), &Location::File(path.clone()));
        assert_eq!(db.location().to_string(), path.display().to_string());
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.db");
        {
            let db = Database::open(&path).unwrap();
            db.with_conn(|conn| {
                conn.execute(
                    "INSERT INTO jobs (id, url, status, snapshot, created_at, updated_at)
                     VALUES ('j1', 'https://www.rightmove.co.uk/properties/1', 'COMPLETED', '{}',
                     '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();
        }
        let reopened = Database::open(&path).unwrap();
        assert_eq!(job_count(&reopened), 1);
    }

    #[test]
    fn test_clones_share_connection() {
        let db = Database::open_in_memory().unwrap();
        let other = db.clone();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO jobs (id, url, status, snapshot, created_at, updated_at)
                 VALUES ('j1', 'u', 'QUEUED', '{}', 't', 't')",
                [],
            )?;
            Ok(())
        })
        .unwrap();
        assert_eq!(job_count(&other), 1);
    }

    #[test]
    fn test_default_database_path() {
        let path = default_database_path().unwrap();
        assert!(path.ends_with(".propertypulse/data/jobs.db"));
    }
}
