use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params};
use uuid::Uuid;

/// Storage keys. Each one is read and written independently.
pub const KEY_ENTRIES: &str = "food-entries";
pub const KEY_API_KEY: &str = "food-api-key";
pub const KEY_GOAL: &str = "food-goal";
pub const KEY_LAST_BACKUP: &str = "food-last-backup";
pub const KEY_BACKUP_SNOOZE: &str = "food-backup-snooze-until";

/// Device-local key/value storage backed by a single SQLite file.
///
/// Every value is a whole document written by one statement, so a reader never
/// observes half of a collection.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS local_storage (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS config (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Key/value items ---

    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM local_storage WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        if let Some(row) = rows.next()? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO local_storage (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    pub fn remove_item(&self, key: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM local_storage WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }

    // --- Device identity ---

    pub fn get_or_create_device_id(&self) -> Result<String> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM config WHERE key = 'device_id'")?;
        let mut rows = stmt.query([])?;
        if let Some(row) = rows.next()? {
            return Ok(row.get(0)?);
        }
        drop(rows);
        drop(stmt);

        let device_id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO config (key, value) VALUES ('device_id', ?1)",
            params![device_id],
        )?;
        Ok(device_id)
    }
}
