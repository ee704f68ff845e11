//! Storage layer for officehunt.
//!
//! This module provides `SQLite`-based persistent storage for the game
//! record (a JSON value in a key/value table) and a log of classification
//! attempts.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::classify::Classification;
use crate::error::{Error, Result};
use crate::game::GameRecord;

/// One classification attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attempt {
    /// Database ID (`None` until stored).
    pub id: Option<i64>,
    /// When the attempt was made.
    pub timestamp: DateTime<Utc>,
    /// Catalog id of the hunted item.
    pub item_id: String,
    /// Whether the photo was accepted.
    pub matched: bool,
    /// Whether the classifier was bypassed.
    pub offline: bool,
}

impl Attempt {
    /// Record an attempt at `item_id` made now.
    #[must_use]
    pub fn new(item_id: impl Into<String>, classification: &Classification) -> Self {
        Self {
            id: None,
            timestamp: Utc::now(),
            item_id: item_id.into(),
            matched: classification.matched,
            offline: classification.offline,
        }
    }
}

/// Storage engine for game state.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the game record stored under `key`.
    ///
    /// A record that does not parse is logged and treated as absent, so a
    /// corrupt save starts a fresh game instead of failing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn load_record(&self, key: &str) -> Result<Option<GameRecord>> {
        let value: Option<String> = self
            .conn
            .query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;

        let Some(value) = value else {
            debug!("No saved record under {}", key);
            return Ok(None);
        };

        match serde_json::from_str(&value) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!("Ignoring unreadable record under {}: {}", key, e);
                Ok(None)
            }
        }
    }

    /// Save the game record under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the database operation fails.
    pub fn save_record(&self, key: &str, record: &GameRecord) -> Result<()> {
        let value = serde_json::to_string(record)?;
        self.conn.execute(
            r"
            INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            ",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        debug!(
            "Saved record under {} ({} items found)",
            key,
            record.completed_count()
        );
        Ok(())
    }

    /// Delete the record under `key`.
    ///
    /// Returns `true` if a record was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn clear_record(&self, key: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM kv_store WHERE key = ?1", [key])?;
        Ok(affected > 0)
    }

    /// Append an attempt to the log, returning its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn record_attempt(&self, attempt: &Attempt) -> Result<i64> {
        self.conn.execute(
            r"
            INSERT INTO attempts (timestamp, item_id, matched, offline)
            VALUES (?1, ?2, ?3, ?4)
            ",
            params![
                attempt.timestamp.to_rfc3339(),
                attempt.item_id,
                attempt.matched,
                attempt.offline,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Recorded attempt {} at {}", id, attempt.item_id);
        Ok(id)
    }

    /// Get the most recent attempts, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn recent_attempts(&self, limit: usize) -> Result<Vec<Attempt>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, timestamp, item_id, matched, offline
            FROM attempts ORDER BY timestamp DESC, id DESC LIMIT ?1
            ",
        )?;

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let attempts = stmt
            .query_map([limit_i64], Self::row_to_attempt)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(attempts)
    }

    /// Delete every logged attempt, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn clear_attempts(&self) -> Result<usize> {
        let affected = self.conn.execute("DELETE FROM attempts", [])?;
        if affected > 0 {
            info!("Cleared {} attempts", affected);
        }
        Ok(affected)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let (total_attempts, matched_attempts, offline_attempts): (i64, i64, i64) =
            self.conn.query_row(
                r"
                SELECT COUNT(*), COALESCE(SUM(matched), 0), COALESCE(SUM(offline), 0)
                FROM attempts
                ",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;

        let last: Option<String> = self
            .conn
            .query_row(
                "SELECT timestamp FROM attempts ORDER BY timestamp DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let last_attempt = last
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let saved_records: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM kv_store", [], |row| row.get(0))?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_attempts,
            matched_attempts,
            offline_attempts,
            saved_records,
            last_attempt,
            db_size_bytes,
        })
    }

    fn row_to_attempt(row: &rusqlite::Row) -> rusqlite::Result<Attempt> {
        let timestamp_str: String = row.get(1)?;
        let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
            .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

        Ok(Attempt {
            id: Some(row.get(0)?),
            timestamp,
            item_id: row.get(2)?,
            matched: row.get(3)?,
            offline: row.get(4)?,
        })
    }
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Total number of logged attempts.
    pub total_attempts: i64,
    /// Attempts that were accepted.
    pub matched_attempts: i64,
    /// Attempts accepted without the classifier.
    pub offline_attempts: i64,
    /// Number of saved records.
    pub saved_records: i64,
    /// Timestamp of the newest attempt.
    pub last_attempt: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::PhotoRef;

    const KEY: &str = "hunt_state_v1";

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    fn record_with(found: &[&str]) -> GameRecord {
        let mut record = GameRecord::default();
        for name in found {
            record.completed_items.push((*name).to_string());
            record.captured_photos.insert(
                (*name).to_string(),
                PhotoRef {
                    reference: format!("{name}.jpg"),
                    offline: false,
                    captured_at: Utc::now(),
                },
            );
        }
        record.current_item_index = found.len();
        record
    }

    #[test]
    fn test_load_missing_record() {
        let storage = create_test_storage();
        assert!(storage.load_record(KEY).unwrap().is_none());
    }

    #[test]
    fn test_save_and_load_record() {
        let storage = create_test_storage();
        let record = record_with(&["Water Bottle", "Chair"]);

        storage.save_record(KEY, &record).unwrap();
        assert_eq!(storage.load_record(KEY).unwrap(), Some(record));
    }

    #[test]
    fn test_save_overwrites() {
        let storage = create_test_storage();
        storage.save_record(KEY, &record_with(&["Chair"])).unwrap();
        storage
            .save_record(KEY, &record_with(&["Chair", "Keyboard"]))
            .unwrap();

        let loaded = storage.load_record(KEY).unwrap().unwrap();
        assert_eq!(loaded.completed_count(), 2);
        assert_eq!(storage.stats().unwrap().saved_records, 1);
    }

    #[test]
    fn test_malformed_record_is_ignored() {
        let storage = create_test_storage();
        storage
            .conn
            .execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, 'not json', 'now')",
                [KEY],
            )
            .unwrap();

        assert!(storage.load_record(KEY).unwrap().is_none());
    }

    #[test]
    fn test_partial_record_keeps_progress() {
        let storage = create_test_storage();
        let value = r#"{
            "completedItems": ["Water Bottle"],
            "currentItemIndex": 1,
            "capturedPhotos": {"Water Bottle": {"reference": "photos/a.jpg"}}
        }"#;
        storage
            .conn
            .execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, 'now')",
                [KEY, value],
            )
            .unwrap();

        let record = storage.load_record(KEY).unwrap().unwrap();
        assert_eq!(record.current_item_index, 1);
        assert!(record.is_found("Water Bottle"));
        assert_eq!(record.captured_photos["Water Bottle"].reference, "photos/a.jpg");
        assert!(!record.captured_photos["Water Bottle"].offline);
        assert!(!record.is_complete);
    }

    #[test]
    fn test_record_uses_camel_case_json() {
        let storage = create_test_storage();
        storage.save_record(KEY, &record_with(&["Chair"])).unwrap();

        let value: String = storage
            .conn
            .query_row("SELECT value FROM kv_store WHERE key = ?1", [KEY], |row| {
                row.get(0)
            })
            .unwrap();
        assert!(value.contains("\"completedItems\""));
        assert!(value.contains("\"currentItemIndex\":1"));
    }

    #[test]
    fn test_clear_record() {
        let storage = create_test_storage();
        storage.save_record(KEY, &record_with(&["Chair"])).unwrap();

        assert!(storage.clear_record(KEY).unwrap());
        assert!(!storage.clear_record(KEY).unwrap());
        assert!(storage.load_record(KEY).unwrap().is_none());
    }

    #[test]
    fn test_records_are_keyed() {
        let storage = create_test_storage();
        storage.save_record(KEY, &record_with(&["Chair"])).unwrap();
        assert!(storage.load_record("other").unwrap().is_none());
    }

    #[test]
    fn test_record_and_list_attempts() {
        let storage = create_test_storage();
        let id1 = storage
            .record_attempt(&Attempt::new("bottle", &Classification::rejected()))
            .unwrap();
        let id2 = storage
            .record_attempt(&Attempt::new("bottle", &Classification::matched()))
            .unwrap();
        assert!(id2 > id1);

        let attempts = storage.recent_attempts(10).unwrap();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].id, Some(id2));
        assert!(attempts[0].matched);
        assert!(!attempts[1].matched);
    }

    #[test]
    fn test_recent_attempts_limit() {
        let storage = create_test_storage();
        for _ in 0..5 {
            storage
                .record_attempt(&Attempt::new("chair", &Classification::rejected()))
                .unwrap();
        }
        assert_eq!(storage.recent_attempts(3).unwrap().len(), 3);
    }

    #[test]
    fn test_clear_attempts() {
        let storage = create_test_storage();
        storage
            .record_attempt(&Attempt::new("chair", &Classification::matched()))
            .unwrap();

        assert_eq!(storage.clear_attempts().unwrap(), 1);
        assert!(storage.recent_attempts(10).unwrap().is_empty());
    }

    #[test]
    fn test_stats() {
        let storage = create_test_storage();
        let empty = storage.stats().unwrap();
        assert_eq!(empty.total_attempts, 0);
        assert!(empty.last_attempt.is_none());
        assert_eq!(empty.db_size_bytes, 0);

        storage
            .record_attempt(&Attempt::new("bottle", &Classification::rejected()))
            .unwrap();
        storage
            .record_attempt(&Attempt::new("bottle", &Classification::offline("No API key")))
            .unwrap();
        storage
            .record_attempt(&Attempt::new("chair", &Classification::matched()))
            .unwrap();

        let stats = storage.stats().unwrap();
        assert_eq!(stats.total_attempts, 3);
        assert_eq!(stats.matched_attempts, 2);
        assert_eq!(stats.offline_attempts, 1);
        assert!(stats.last_attempt.is_some());
    }

    #[test]
    fn test_open_file_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("hunt.db");

        {
            let storage = Storage::open(&path).unwrap();
            storage.save_record(KEY, &record_with(&["Chair"])).unwrap();
        }

        let storage = Storage::open(&path).unwrap();
        assert_eq!(storage.path(), path);
        let record = storage.load_record(KEY).unwrap().unwrap();
        assert_eq!(record.completed_items, vec!["Chair".to_string()]);
        assert!(storage.stats().unwrap().db_size_bytes > 0);
    }
}
