//! `SQLite` schema definitions for officehunt.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the key/value table holding the game record.
pub const CREATE_KV_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// SQL statement to create the log of classification attempts.
pub const CREATE_ATTEMPTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS attempts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    item_id TEXT NOT NULL,
    matched INTEGER NOT NULL,
    offline INTEGER NOT NULL
)
";

/// SQL statement to create an index on attempt timestamps.
pub const CREATE_ATTEMPTS_TIMESTAMP_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_attempts_timestamp ON attempts(timestamp DESC)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_KV_TABLE,
    CREATE_ATTEMPTS_TABLE,
    CREATE_ATTEMPTS_TIMESTAMP_INDEX,
    CREATE_METADATA_TABLE,
];
