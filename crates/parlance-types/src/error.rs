use thiserror::Error;

/// Errors from identifier generation and parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("invalid identifier format: {0}")]
    InvalidFormat(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Errors surfaced by the backend connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("connection is closed")]
    Closed,

    #[error("a transaction is already active on this connection")]
    TransactionActive,

    #[error("no active transaction")]
    NoTransaction,

    #[error("query error: {0}")]
    Query(String),

    #[error("execute error: {0}")]
    Execute(String),

    #[error("column '{column}': {message}")]
    Decode { column: String, message: String },
}

/// Errors from repository operations (used by trait definitions in
/// parlance-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Backend failure wrapped with the name of the repository operation.
    /// Bound parameter values are never included.
    #[error("{operation}: {source}")]
    Backend {
        operation: &'static str,
        #[source]
        source: ConnectionError,
    },

    /// The row written by an insert could not be re-read -- a backend
    /// consistency anomaly, not a validation failure.
    #[error("{operation}: inserted row could not be re-read")]
    InsertFailed { operation: &'static str },

    /// A result row did not map losslessly onto the entity.
    #[error("row mapping failed: {0}")]
    Mapping(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Database context/manager lifecycle errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database manager is not initialized")]
    NotInitialized,

    #[error("database manager is already initialized")]
    AlreadyInitialized,

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Errors from the completion forwarder.
#[derive(Debug, Error)]
pub enum ForwarderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("completion endpoint returned {status}: {body}")]
    Endpoint { status: u16, body: String },

    #[error("failed to decode response body: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_error_display() {
        let err = IdentityError::InvalidFormat("expected 32 or 36 characters, got 5".to_string());
        assert!(err.to_string().contains("invalid identifier format"));
    }

    #[test]
    fn test_connection_error_display() {
        assert_eq!(ConnectionError::Closed.to_string(), "connection is closed");
        let err = ConnectionError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_repository_error_carries_operation() {
        let err = RepositoryError::Backend {
            operation: "users.insert",
            source: ConnectionError::Execute("UNIQUE constraint failed".to_string()),
        };
        let display = err.to_string();
        assert!(display.contains("users.insert"));
        assert!(display.contains("UNIQUE constraint failed"));
    }

    #[test]
    fn test_database_error_display() {
        assert_eq!(
            DatabaseError::NotInitialized.to_string(),
            "database manager is not initialized"
        );
        assert_eq!(
            DatabaseError::AlreadyInitialized.to_string(),
            "database manager is already initialized"
        );
    }

    #[test]
    fn test_forwarder_error_display() {
        let err = ForwarderError::Endpoint {
            status: 429,
            body: "{\"error\":\"rate_limited\"}".to_string(),
        };
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("rate_limited"));
    }
}
