//! Database manager: binds a context to a configuration exactly once.

use std::sync::Arc;

use parlance_types::config::DatabaseConfig;
use parlance_types::error::DatabaseError;

use super::context::DatabaseContext;
use super::sqlite::SqliteConnection;

/// Owns at most one live [`DatabaseContext`].
///
/// Constructed once at the process composition root and passed down
/// explicitly -- there is no ambient global lookup. `initialize` is not
/// reentrant: a second call fails with `AlreadyInitialized` rather than
/// silently replacing the context.
#[derive(Default)]
pub struct DatabaseManager {
    context: Option<Arc<DatabaseContext<SqliteConnection>>>,
}

impl DatabaseManager {
    pub fn new() -> Self {
        Self { context: None }
    }

    /// Connect, wire the context, and create the schema.
    pub async fn initialize(&mut self, config: &DatabaseConfig) -> Result<(), DatabaseError> {
        if self.context.is_some() {
            return Err(DatabaseError::AlreadyInitialized);
        }

        let connection = Arc::new(SqliteConnection::connect(config).await?);
        let context = DatabaseContext::new(connection);
        context.initialize().await?;
        self.context = Some(Arc::new(context));

        tracing::info!(url = %config.url, "database manager initialized");
        Ok(())
    }

    /// The live context. Fails fast when called before `initialize`.
    pub fn context(&self) -> Result<Arc<DatabaseContext<SqliteConnection>>, DatabaseError> {
        self.context.clone().ok_or(DatabaseError::NotInitialized)
    }

    /// Tear down the held context. Safe to call repeatedly; after teardown
    /// the manager reports `NotInitialized` again.
    pub async fn close(&mut self) -> Result<(), DatabaseError> {
        if let Some(context) = self.context.take() {
            context.close().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlance_core::repository::user::UserRepository;

    fn test_config() -> DatabaseConfig {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        // Leak tempdir so it lives for the test
        std::mem::forget(dir);
        DatabaseConfig::new(url)
    }

    #[tokio::test]
    async fn test_context_before_initialize_fails() {
        let manager = DatabaseManager::new();
        let err = manager.context().unwrap_err();
        assert!(matches!(err, DatabaseError::NotInitialized));
    }

    #[tokio::test]
    async fn test_initialize_then_context() {
        let mut manager = DatabaseManager::new();
        manager.initialize(&test_config()).await.unwrap();

        let context = manager.context().unwrap();
        assert_eq!(context.users.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_initialize_is_not_reentrant() {
        let mut manager = DatabaseManager::new();
        manager.initialize(&test_config()).await.unwrap();

        let err = manager.initialize(&test_config()).await.unwrap_err();
        assert!(matches!(err, DatabaseError::AlreadyInitialized));

        // The original context is untouched.
        assert!(manager.context().is_ok());
    }

    #[tokio::test]
    async fn test_close_then_context_fails_again() {
        let mut manager = DatabaseManager::new();
        manager.initialize(&test_config()).await.unwrap();
        manager.close().await.unwrap();
        manager.close().await.unwrap();

        let err = manager.context().unwrap_err();
        assert!(matches!(err, DatabaseError::NotInitialized));
    }
}
