//! SQLite-based check-in storage.
//!
//! Provides persistent storage for:
//! - The check-in history log (newest first)
//! - Key-value store for application state (last known location)

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{DatabaseError, Result};
use crate::record::{CheckInRecord, Coordinates};

use super::data_dir;
use super::history::{duplicate_id, HistoryStore};

const LAST_LOCATION_KEY: &str = "last_location";

/// SQLite database for check-in history.
pub struct HistoryDb {
    conn: Connection,
}

impl HistoryDb {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/stillokay/stillokay.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&data_dir()?.join("stillokay.db"))
    }

    /// Open (or create) a database file at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::from)?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS checkins (
                    seq       INTEGER PRIMARY KEY AUTOINCREMENT,
                    id        TEXT NOT NULL UNIQUE,
                    date      TEXT NOT NULL DEFAULT '',
                    status    TEXT NOT NULL,
                    latitude  REAL NOT NULL,
                    longitude REAL NOT NULL
                );

                CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );",
            )
            .map_err(DatabaseError::from)?;
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM checkins", [], |row| row.get(0))
            .map_err(DatabaseError::from)?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    /// Import a newest-first log (e.g. an exported JSON history).
    ///
    /// Records whose id is already present are skipped. Returns how many
    /// were inserted.
    pub fn import(&mut self, newest_first: &[CheckInRecord]) -> Result<usize> {
        let tx = self.conn.transaction().map_err(DatabaseError::from)?;
        let mut inserted = 0;
        for record in newest_first.iter().rev() {
            inserted += tx
                .execute(
                    "INSERT OR IGNORE INTO checkins (id, date, status, latitude, longitude)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        record.id,
                        record.date,
                        record.status,
                        record.coords.latitude,
                        record.coords.longitude,
                    ],
                )
                .map_err(DatabaseError::from)?;
        }
        tx.commit().map_err(DatabaseError::from)?;
        tracing::info!(inserted, total = newest_first.len(), "imported check-in history");
        Ok(inserted)
    }

    pub fn set_last_location(&self, coords: Coordinates) -> Result<()> {
        let value = serde_json::to_string(&coords)?;
        self.kv_set(LAST_LOCATION_KEY, &value)
    }

    pub fn last_location(&self) -> Result<Option<Coordinates>> {
        match self.kv_get(LAST_LOCATION_KEY)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .map_err(DatabaseError::from)?;
        Ok(value)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(DatabaseError::from)?;
        Ok(())
    }
}

impl HistoryStore for HistoryDb {
    fn load(&self) -> Result<Vec<CheckInRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, date, status, latitude, longitude
                 FROM checkins
                 ORDER BY seq DESC",
            )
            .map_err(DatabaseError::from)?;

        let rows = stmt
            .query_map([], |row| {
                Ok(CheckInRecord {
                    id: row.get(0)?,
                    date: row.get(1)?,
                    status: row.get(2)?,
                    coords: Coordinates {
                        latitude: row.get(3)?,
                        longitude: row.get(4)?,
                    },
                })
            })
            .map_err(DatabaseError::from)?;

        let records = rows
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(DatabaseError::from)?;
        Ok(records)
    }

    fn append(&mut self, record: CheckInRecord) -> Result<()> {
        let exists: bool = self
            .conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM checkins WHERE id = ?1)",
                params![record.id],
                |row| row.get(0),
            )
            .map_err(DatabaseError::from)?;
        if exists {
            return Err(duplicate_id(&record.id).into());
        }

        self.conn
            .execute(
                "INSERT INTO checkins (id, date, status, latitude, longitude)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id,
                    record.date,
                    record.status,
                    record.coords.latitude,
                    record.coords.longitude,
                ],
            )
            .map_err(DatabaseError::from)?;
        tracing::info!(id = %record.id, "check-in recorded");
        Ok(())
    }

    fn delete_by_id(&mut self, id: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM checkins WHERE id = ?1", params![id])
            .map_err(DatabaseError::from)?;
        tracing::info!(id, removed, "check-in deleted");
        Ok(removed > 0)
    }

    fn clear(&mut self) -> Result<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM checkins", [])
            .map_err(DatabaseError::from)?;
        tracing::info!(removed, "check-in history cleared");
        Ok(removed)
    }
}
