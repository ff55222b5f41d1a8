//! SQLite implementation of the `Connection` contract.
//!
//! Wraps a sqlx `SqlitePool` in WAL mode with foreign keys enforced and a
//! configurable busy timeout. Transaction state lives behind an async
//! mutex: at most one transaction is open per connection, and while one is
//! open every statement routes through it, serializing at the connection
//! boundary. Outside a transaction, statements run directly on the pool and
//! concurrent callers proceed in parallel.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
    SqliteRow,
};
use sqlx::{Column, Row as _, Sqlite, TypeInfo, ValueRef as _};
use tokio::sync::Mutex;

use parlance_core::connection::{Connection, ExecuteResult, SqlRow, SqlValue};
use parlance_types::config::DatabaseConfig;
use parlance_types::error::ConnectionError;

/// SQLite-backed [`Connection`].
pub struct SqliteConnection {
    pool: SqlitePool,
    state: Mutex<ConnectionState>,
}

#[derive(Default)]
struct ConnectionState {
    closed: bool,
    tx: Option<sqlx::Transaction<'static, Sqlite>>,
}

impl SqliteConnection {
    /// Open a database from its configuration.
    ///
    /// Creates the database file if missing. WAL journal mode, foreign key
    /// enforcement, and the configured busy timeout apply to every pooled
    /// connection.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, ConnectionError> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| ConnectionError::Open(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(config.busy_timeout_secs))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| ConnectionError::Open(e.to_string()))?;

        tracing::debug!(url = %config.url, "opened sqlite database");

        Ok(Self {
            pool,
            state: Mutex::new(ConnectionState::default()),
        })
    }
}

/// Bind positional parameters through the driver, never into the statement
/// text.
fn bind_params<'q>(
    sql: &'q str,
    params: &'q [SqlValue],
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    let mut query = sqlx::query(sql);
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<i64>),
            SqlValue::Integer(v) => query.bind(*v),
            SqlValue::Real(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.as_str()),
            SqlValue::Blob(v) => query.bind(v.as_slice()),
        };
    }
    query
}

fn decode_error(column: &str, message: impl std::fmt::Display) -> ConnectionError {
    ConnectionError::Decode {
        column: column.to_string(),
        message: message.to_string(),
    }
}

/// Decode a driver row into the backend-neutral row shape by storage class.
fn decode_row(row: &SqliteRow) -> Result<SqlRow, ConnectionError> {
    let mut columns = Vec::with_capacity(row.len());
    for column in row.columns() {
        let name = column.name();
        let ordinal = column.ordinal();
        let raw = row
            .try_get_raw(ordinal)
            .map_err(|e| decode_error(name, e))?;
        let value = if raw.is_null() {
            SqlValue::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" | "BOOLEAN" => SqlValue::Integer(
                    row.try_get::<i64, _>(ordinal)
                        .map_err(|e| decode_error(name, e))?,
                ),
                "REAL" => SqlValue::Real(
                    row.try_get::<f64, _>(ordinal)
                        .map_err(|e| decode_error(name, e))?,
                ),
                "BLOB" => SqlValue::Blob(
                    row.try_get::<Vec<u8>, _>(ordinal)
                        .map_err(|e| decode_error(name, e))?,
                ),
                _ => SqlValue::Text(
                    row.try_get::<String, _>(ordinal)
                        .map_err(|e| decode_error(name, e))?,
                ),
            }
        };
        columns.push((name.to_string(), value));
    }
    Ok(SqlRow::new(columns))
}

impl Connection for SqliteConnection {
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<SqlRow>, ConnectionError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(ConnectionError::Closed);
        }
        let rows = if let Some(tx) = state.tx.as_mut() {
            bind_params(sql, params).fetch_all(&mut **tx).await
        } else {
            drop(state);
            bind_params(sql, params).fetch_all(&self.pool).await
        }
        .map_err(|e| ConnectionError::Query(e.to_string()))?;

        rows.iter().map(decode_row).collect()
    }

    async fn query_one(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Option<SqlRow>, ConnectionError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(ConnectionError::Closed);
        }
        let row = if let Some(tx) = state.tx.as_mut() {
            bind_params(sql, params).fetch_optional(&mut **tx).await
        } else {
            drop(state);
            bind_params(sql, params).fetch_optional(&self.pool).await
        }
        .map_err(|e| ConnectionError::Query(e.to_string()))?;

        row.as_ref().map(decode_row).transpose()
    }

    async fn execute(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<ExecuteResult, ConnectionError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(ConnectionError::Closed);
        }
        let result = if let Some(tx) = state.tx.as_mut() {
            bind_params(sql, params).execute(&mut **tx).await
        } else {
            drop(state);
            bind_params(sql, params).execute(&self.pool).await
        }
        .map_err(|e| ConnectionError::Execute(e.to_string()))?;

        Ok(ExecuteResult {
            rows_affected: result.rows_affected(),
            last_insert_id: result.last_insert_rowid(),
        })
    }

    async fn begin_transaction(&self) -> Result<(), ConnectionError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(ConnectionError::Closed);
        }
        if state.tx.is_some() {
            return Err(ConnectionError::TransactionActive);
        }
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ConnectionError::Execute(e.to_string()))?;
        state.tx = Some(tx);
        Ok(())
    }

    async fn commit(&self) -> Result<(), ConnectionError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(ConnectionError::Closed);
        }
        let tx = state.tx.take().ok_or(ConnectionError::NoTransaction)?;
        tx.commit()
            .await
            .map_err(|e| ConnectionError::Execute(e.to_string()))
    }

    async fn rollback(&self) -> Result<(), ConnectionError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(ConnectionError::Closed);
        }
        let tx = state.tx.take().ok_or(ConnectionError::NoTransaction)?;
        tx.rollback()
            .await
            .map_err(|e| ConnectionError::Execute(e.to_string()))
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        let mut state = self.state.lock().await;
        if state.closed {
            // Second close after a completed first close is a no-op.
            return Ok(());
        }
        if let Some(tx) = state.tx.take() {
            // An open transaction cannot outlive its connection.
            if let Err(e) = tx.rollback().await {
                tracing::warn!("rollback during close failed: {e}");
            }
        }
        state.closed = true;
        self.pool.close().await;
        tracing::debug!("closed sqlite database");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_connection() -> SqliteConnection {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        // Leak tempdir so it lives for the test
        std::mem::forget(dir);
        SqliteConnection::connect(&DatabaseConfig::new(url))
            .await
            .unwrap()
    }

    async fn with_scratch_table(conn: &SqliteConnection) {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS scratch (id INTEGER PRIMARY KEY AUTOINCREMENT, label TEXT NOT NULL)",
            &[],
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_wal_mode_and_foreign_keys() {
        let conn = test_connection().await;

        let row = conn.query_one("PRAGMA journal_mode", &[]).await.unwrap().unwrap();
        assert_eq!(row.try_text("journal_mode").unwrap().to_lowercase(), "wal");

        let row = conn.query_one("PRAGMA foreign_keys", &[]).await.unwrap().unwrap();
        assert_eq!(row.try_i64("foreign_keys").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_execute_reports_generated_key_and_affected_rows() {
        let conn = test_connection().await;
        with_scratch_table(&conn).await;

        let first = conn
            .execute("INSERT INTO scratch (label) VALUES (?)", &[SqlValue::from("a")])
            .await
            .unwrap();
        let second = conn
            .execute("INSERT INTO scratch (label) VALUES (?)", &[SqlValue::from("b")])
            .await
            .unwrap();
        assert_eq!(first.rows_affected, 1);
        assert!(second.last_insert_id > first.last_insert_id);

        // Zero affected rows is a valid outcome, not an error.
        let none = conn
            .execute(
                "UPDATE scratch SET label = ? WHERE id = ?",
                &[SqlValue::from("c"), SqlValue::from(9999i64)],
            )
            .await
            .unwrap();
        assert_eq!(none.rows_affected, 0);
    }

    #[tokio::test]
    async fn test_parameters_are_bound_not_spliced() {
        let conn = test_connection().await;
        with_scratch_table(&conn).await;

        let hostile = "'; DROP TABLE scratch; --";
        conn.execute(
            "INSERT INTO scratch (label) VALUES (?)",
            &[SqlValue::from(hostile)],
        )
        .await
        .unwrap();

        let row = conn
            .query_one(
                "SELECT label FROM scratch WHERE label = ?",
                &[SqlValue::from(hostile)],
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.try_text("label").unwrap(), hostile);
    }

    #[tokio::test]
    async fn test_transaction_commit_and_rollback() {
        let conn = test_connection().await;
        with_scratch_table(&conn).await;

        conn.begin_transaction().await.unwrap();
        conn.execute("INSERT INTO scratch (label) VALUES (?)", &[SqlValue::from("kept")])
            .await
            .unwrap();
        conn.commit().await.unwrap();

        conn.begin_transaction().await.unwrap();
        conn.execute(
            "INSERT INTO scratch (label) VALUES (?)",
            &[SqlValue::from("discarded")],
        )
        .await
        .unwrap();
        conn.rollback().await.unwrap();

        let rows = conn.query("SELECT label FROM scratch", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].try_text("label").unwrap(), "kept");
    }

    #[tokio::test]
    async fn test_nested_transaction_fails_fast() {
        let conn = test_connection().await;

        conn.begin_transaction().await.unwrap();
        let err = conn.begin_transaction().await.unwrap_err();
        assert!(matches!(err, ConnectionError::TransactionActive));
        conn.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_commit_without_transaction_fails() {
        let conn = test_connection().await;
        assert!(matches!(
            conn.commit().await.unwrap_err(),
            ConnectionError::NoTransaction
        ));
        assert!(matches!(
            conn.rollback().await.unwrap_err(),
            ConnectionError::NoTransaction
        ));
    }

    #[tokio::test]
    async fn test_operations_after_close_fail() {
        let conn = test_connection().await;
        with_scratch_table(&conn).await;
        conn.close().await.unwrap();

        assert!(matches!(
            conn.query("SELECT 1 AS one", &[]).await.unwrap_err(),
            ConnectionError::Closed
        ));
        assert!(matches!(
            conn.execute("DELETE FROM scratch", &[]).await.unwrap_err(),
            ConnectionError::Closed
        ));
        assert!(matches!(
            conn.begin_transaction().await.unwrap_err(),
            ConnectionError::Closed
        ));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let conn = test_connection().await;
        conn.close().await.unwrap();
        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_rolls_back_open_transaction() {
        let conn = test_connection().await;
        with_scratch_table(&conn).await;
        conn.begin_transaction().await.unwrap();
        conn.execute("INSERT INTO scratch (label) VALUES (?)", &[SqlValue::from("x")])
            .await
            .unwrap();
        conn.close().await.unwrap();
    }
}
