//! SQLite read-only query backend for `QueryExecutor`.
//!
//! Runs guarded `SELECT` statements against an embedded database and
//! stringifies every value, so results can flow through prompts and feedback
//! without type plumbing.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use tracing::debug;

use crate::capability::{guard, QueryExecutor, QueryRows};
use crate::error::PipelineError;

/// Embedded SQLite executor. Queries pass the read-only guard before dispatch.
pub struct SqliteExecutor {
    conn: Mutex<Connection>,
}

impl SqliteExecutor {
    /// Opens (or creates) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let conn = Connection::open(path)
            .map_err(|e| PipelineError::Query(format!("open failed: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory database. Handy for tests and demos.
    pub fn in_memory() -> Result<Self, PipelineError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| PipelineError::Query(format!("open failed: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Runs arbitrary setup SQL (schema creation, seed data). This is the
    /// owner's side door and does not pass the guard; queries arriving
    /// through [`QueryExecutor`] always do.
    pub fn execute_batch(&self, sql: &str) -> Result<(), PipelineError> {
        let conn = self.lock()?;
        conn.execute_batch(sql)
            .map_err(|e| PipelineError::Query(format!("setup failed: {e}")))
    }

    /// One line per table: `name(column TYPE, ...)`. Used for prompt assembly.
    pub fn schema_summary(&self) -> Result<String, PipelineError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )
            .map_err(|e| PipelineError::Query(e.to_string()))?;
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| PipelineError::Query(e.to_string()))?
            .collect::<Result<_, _>>()
            .map_err(|e| PipelineError::Query(e.to_string()))?;

        let mut lines = Vec::with_capacity(tables.len());
        for table in tables {
            let mut info = conn
                .prepare(&format!("PRAGMA table_info({table})"))
                .map_err(|e| PipelineError::Query(e.to_string()))?;
            let columns: Vec<String> = info
                .query_map([], |row| {
                    let name: String = row.get(1)?;
                    let ty: String = row.get(2)?;
                    Ok(format!("{name} {ty}"))
                })
                .map_err(|e| PipelineError::Query(e.to_string()))?
                .collect::<Result<_, _>>()
                .map_err(|e| PipelineError::Query(e.to_string()))?;
            lines.push(format!("{table}({})", columns.join(", ")));
        }
        Ok(lines.join("\n"))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, PipelineError> {
        self.conn
            .lock()
            .map_err(|_| PipelineError::Query("connection lock poisoned".to_string()))
    }

    fn value_to_string(value: ValueRef<'_>) -> String {
        match value {
            ValueRef::Null => "NULL".to_string(),
            ValueRef::Integer(i) => i.to_string(),
            ValueRef::Real(f) => f.to_string(),
            ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
            ValueRef::Blob(b) => format!("<blob {} bytes>", b.len()),
        }
    }
}

#[async_trait]
impl QueryExecutor for SqliteExecutor {
    async fn execute_query(&self, query: &str) -> Result<QueryRows, PipelineError> {
        guard::ensure_read_only(query)?;
        debug!(query = %query, "Executing query");

        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(query)
            .map_err(|e| PipelineError::Query(format!("prepare failed: {e}")))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let column_count = columns.len();

        let mut raw_rows = stmt
            .query([])
            .map_err(|e| PipelineError::Query(format!("query failed: {e}")))?;
        let mut rows = Vec::new();
        while let Some(row) = raw_rows
            .next()
            .map_err(|e| PipelineError::Query(format!("row read failed: {e}")))?
        {
            let mut record = Vec::with_capacity(column_count);
            for i in 0..column_count {
                let value = row
                    .get_ref(i)
                    .map_err(|e| PipelineError::Query(format!("column read failed: {e}")))?;
                record.push(Self::value_to_string(value));
            }
            rows.push(record);
        }

        let row_count = rows.len();
        debug!(rows = row_count, "Query complete");
        Ok(QueryRows {
            columns,
            rows,
            row_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> SqliteExecutor {
        let executor = SqliteExecutor::in_memory().unwrap();
        executor
            .execute_batch(
                "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, updated_at TEXT);\
                 INSERT INTO users (name, updated_at) VALUES ('alice', '2026-01-01');\
                 INSERT INTO users (name, updated_at) VALUES ('bob', NULL);",
            )
            .unwrap();
        executor
    }

    /// **Scenario**: A SELECT returns column names and stringified rows,
    /// rendering NULL explicitly.
    #[tokio::test]
    async fn select_returns_stringified_rows() {
        let executor = seeded();
        let rows = executor
            .execute_query("SELECT name, updated_at FROM users ORDER BY id")
            .await
            .unwrap();
        assert_eq!(rows.columns, vec!["name", "updated_at"]);
        assert_eq!(rows.row_count, 2);
        assert_eq!(rows.rows[0], vec!["alice", "2026-01-01"]);
        assert_eq!(rows.rows[1], vec!["bob", "NULL"]);
    }

    /// **Scenario**: A mutating statement is rejected by the guard without
    /// reaching SQLite.
    #[tokio::test]
    async fn mutating_statement_rejected_by_guard() {
        let executor = seeded();
        let result = executor.execute_query("DELETE FROM users").await;
        assert!(matches!(result, Err(PipelineError::RejectedQuery(_))));
        // Table is untouched.
        let rows = executor
            .execute_query("SELECT id FROM users")
            .await
            .unwrap();
        assert_eq!(rows.row_count, 2);
    }

    /// **Scenario**: A syntactically invalid SELECT surfaces a Query error,
    /// not a rejection.
    #[tokio::test]
    async fn invalid_sql_is_query_error() {
        let executor = seeded();
        let result = executor.execute_query("SELECT nope FROM users").await;
        assert!(matches!(result, Err(PipelineError::Query(_))));
    }

    /// **Scenario**: schema_summary lists tables with typed columns.
    #[test]
    fn schema_summary_lists_tables() {
        let executor = seeded();
        let summary = executor.schema_summary().unwrap();
        assert_eq!(summary, "users(id INTEGER, name TEXT, updated_at TEXT)");
    }
}
