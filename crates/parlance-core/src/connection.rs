//! Backend-neutral connection contract.
//!
//! Abstracts a relational backend behind parameterized query/execute,
//! single-row fetch, and transaction control. Statement parameters are
//! positional [`SqlValue`]s bound through the driver -- never concatenated
//! into statement text.

use parlance_types::error::ConnectionError;

/// A positional statement parameter or a decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Whether this value is SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => SqlValue::Null,
        }
    }
}

/// A single result row: column names with decoded values, in select order.
///
/// Accessors are the seam where backend rows turn into typed values; a
/// missing column or a storage-class mismatch surfaces as
/// [`ConnectionError::Decode`] naming the column.
#[derive(Debug, Clone)]
pub struct SqlRow {
    columns: Vec<(String, SqlValue)>,
}

impl SqlRow {
    /// Build a row from (column, value) pairs in select order.
    pub fn new(columns: Vec<(String, SqlValue)>) -> Self {
        Self { columns }
    }

    /// Number of columns in the row.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Look up a column by name.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    fn require(&self, column: &str) -> Result<&SqlValue, ConnectionError> {
        self.get(column).ok_or_else(|| ConnectionError::Decode {
            column: column.to_string(),
            message: "column missing from result row".to_string(),
        })
    }

    fn mismatch(column: &str, expected: &str, got: &SqlValue) -> ConnectionError {
        ConnectionError::Decode {
            column: column.to_string(),
            message: format!("expected {expected}, got {got:?}"),
        }
    }

    pub fn try_i64(&self, column: &str) -> Result<i64, ConnectionError> {
        match self.require(column)? {
            SqlValue::Integer(v) => Ok(*v),
            other => Err(Self::mismatch(column, "INTEGER", other)),
        }
    }

    pub fn try_f64(&self, column: &str) -> Result<f64, ConnectionError> {
        match self.require(column)? {
            SqlValue::Real(v) => Ok(*v),
            SqlValue::Integer(v) => Ok(*v as f64),
            other => Err(Self::mismatch(column, "REAL", other)),
        }
    }

    pub fn try_text(&self, column: &str) -> Result<String, ConnectionError> {
        match self.require(column)? {
            SqlValue::Text(v) => Ok(v.clone()),
            other => Err(Self::mismatch(column, "TEXT", other)),
        }
    }

    pub fn opt_i64(&self, column: &str) -> Result<Option<i64>, ConnectionError> {
        match self.require(column)? {
            SqlValue::Null => Ok(None),
            SqlValue::Integer(v) => Ok(Some(*v)),
            other => Err(Self::mismatch(column, "INTEGER or NULL", other)),
        }
    }

    pub fn opt_f64(&self, column: &str) -> Result<Option<f64>, ConnectionError> {
        match self.require(column)? {
            SqlValue::Null => Ok(None),
            SqlValue::Real(v) => Ok(Some(*v)),
            SqlValue::Integer(v) => Ok(Some(*v as f64)),
            other => Err(Self::mismatch(column, "REAL or NULL", other)),
        }
    }

    pub fn opt_text(&self, column: &str) -> Result<Option<String>, ConnectionError> {
        match self.require(column)? {
            SqlValue::Null => Ok(None),
            SqlValue::Text(v) => Ok(Some(v.clone())),
            other => Err(Self::mismatch(column, "TEXT or NULL", other)),
        }
    }
}

/// Outcome of a non-query statement.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteResult {
    /// Rows matched and changed by the statement. Zero is a valid outcome,
    /// not an error; callers interpret it.
    pub rows_affected: u64,
    /// Generated key of the most recent successful INSERT on this
    /// connection; zero before any insert.
    pub last_insert_id: i64,
}

/// Backend-neutral database connection.
///
/// Implementations live in `parlance-infra` (e.g. `SqliteConnection`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
///
/// Transactions are connection-scoped: `begin_transaction`, `commit`, and
/// `rollback` bracket statements issued on this same connection, and nested
/// `begin_transaction` calls fail fast with `TransactionActive` rather than
/// silently flattening. Every operation after `close` fails with `Closed`;
/// `close` itself may be called repeatedly. No operation carries a timeout
/// or cancellation token -- callers wrap calls with their own deadline.
pub trait Connection: Send + Sync {
    /// Run a SELECT and decode every result row.
    fn query(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> impl std::future::Future<Output = Result<Vec<SqlRow>, ConnectionError>> + Send;

    /// Run a SELECT expected to produce at most one row.
    fn query_one(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> impl std::future::Future<Output = Result<Option<SqlRow>, ConnectionError>> + Send;

    /// Run an INSERT/UPDATE/DELETE/DDL statement.
    fn execute(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> impl std::future::Future<Output = Result<ExecuteResult, ConnectionError>> + Send;

    /// Open a transaction on this connection.
    fn begin_transaction(
        &self,
    ) -> impl std::future::Future<Output = Result<(), ConnectionError>> + Send;

    /// Commit the active transaction.
    fn commit(&self) -> impl std::future::Future<Output = Result<(), ConnectionError>> + Send;

    /// Roll back the active transaction.
    fn rollback(&self) -> impl std::future::Future<Output = Result<(), ConnectionError>> + Send;

    /// Release the connection. Further operations fail with `Closed`;
    /// calling `close` again is a no-op.
    fn close(&self) -> impl std::future::Future<Output = Result<(), ConnectionError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_value_from_conversions() {
        assert_eq!(SqlValue::from(42i64), SqlValue::Integer(42));
        assert_eq!(SqlValue::from(7u32), SqlValue::Integer(7));
        assert_eq!(SqlValue::from("abc"), SqlValue::Text("abc".to_string()));
        assert_eq!(SqlValue::from(1.5f64), SqlValue::Real(1.5));
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(
            SqlValue::from(Some("x".to_string())),
            SqlValue::Text("x".to_string())
        );
        assert!(SqlValue::Null.is_null());
        assert!(!SqlValue::Integer(0).is_null());
    }

    fn sample_row() -> SqlRow {
        SqlRow::new(vec![
            ("id".to_string(), SqlValue::Integer(3)),
            ("name".to_string(), SqlValue::Text("alice".to_string())),
            ("score".to_string(), SqlValue::Real(0.5)),
            ("deleted_at".to_string(), SqlValue::Null),
        ])
    }

    #[test]
    fn test_row_typed_accessors() {
        let row = sample_row();
        assert_eq!(row.try_i64("id").unwrap(), 3);
        assert_eq!(row.try_text("name").unwrap(), "alice");
        assert_eq!(row.try_f64("score").unwrap(), 0.5);
        assert_eq!(row.opt_text("deleted_at").unwrap(), None);
        assert_eq!(row.opt_i64("deleted_at").unwrap(), None);
        assert_eq!(row.opt_text("name").unwrap(), Some("alice".to_string()));
        assert_eq!(row.len(), 4);
        assert!(!row.is_empty());
    }

    #[test]
    fn test_row_missing_column() {
        let row = sample_row();
        let err = row.try_i64("missing").unwrap_err();
        assert!(matches!(err, ConnectionError::Decode { column, .. } if column == "missing"));
    }

    #[test]
    fn test_row_type_mismatch() {
        let row = sample_row();
        let err = row.try_i64("name").unwrap_err();
        assert!(matches!(err, ConnectionError::Decode { column, .. } if column == "name"));
        // Integers widen to floats, but not the other way around.
        assert!(row.try_f64("id").is_ok());
        assert!(row.try_i64("score").is_err());
    }
}
