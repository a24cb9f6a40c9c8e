// Write operations on the state table
use crate::error::Result;
use rusqlite::Connection;

/// Insert or overwrite the value stored under `key`
pub fn write_state(conn: &Connection, key: &str, value: &str) -> Result<()> {
    let updated_at = chrono::Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO state (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        (key, value, &updated_at),
    )?;

    Ok(())
}
