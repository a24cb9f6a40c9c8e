// Read operations on the state table
use crate::error::Result;
use rusqlite::{Connection, OptionalExtension};

/// Read the stored value for `key`, if any
pub fn read_state(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM state WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()?;

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{open_test_db, write};

    #[test]
    fn missing_key_reads_none() {
        let conn = open_test_db().unwrap();
        assert_eq!(read_state(&conn, "Pinterest").unwrap(), None);
    }

    #[test]
    fn reads_back_written_value() {
        let conn = open_test_db().unwrap();
        write::write_state(&conn, "Pinterest", r#"{"a":1}"#).unwrap();

        assert_eq!(
            read_state(&conn, "Pinterest").unwrap().as_deref(),
            Some(r#"{"a":1}"#)
        );
    }
}
