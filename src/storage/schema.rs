//! Database schema definitions.

use duckdb::Connection;

use crate::storage::StorageError;

/// SQL statement for creating the debug_records table.
///
/// One row per flushed record; `kind` is `data` or `summary` and `payload`
/// holds the record as a JSON string. Re-flushing an id upserts.
pub const DEBUG_RECORDS_TABLE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS debug_records (
    debugger_id VARCHAR NOT NULL,
    kind        VARCHAR NOT NULL,
    payload     VARCHAR NOT NULL,
    created_at  BIGINT NOT NULL,
    PRIMARY KEY (debugger_id, kind)
);
"#;

/// Initialize the database schema.
pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(DEBUG_RECORDS_TABLE_DDL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM debug_records", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
