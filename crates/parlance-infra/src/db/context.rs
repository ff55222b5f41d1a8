//! Database context: one initialization/teardown lifecycle over the
//! connection and the three repositories.

use std::sync::Arc;

use parlance_core::connection::Connection;
use parlance_core::repository::message::MessageRepository;
use parlance_core::repository::session::SessionRepository;
use parlance_core::repository::user::UserRepository;
use parlance_types::error::{ConnectionError, RepositoryError};

use super::message::SqlMessageRepository;
use super::session::SqlSessionRepository;
use super::user::SqlUserRepository;

/// Aggregates the repositories behind one initialize/teardown lifecycle.
///
/// The context exclusively owns its connection: the repositories share the
/// same handle and do not outlive the context, and the connection is closed
/// exactly once during [`DatabaseContext::close`] -- a second call is a
/// no-op, delegated to the connection's idempotent close.
pub struct DatabaseContext<C: Connection> {
    connection: Arc<C>,
    pub users: SqlUserRepository<C>,
    pub sessions: SqlSessionRepository<C>,
    pub messages: SqlMessageRepository<C>,
}

impl<C: Connection> std::fmt::Debug for DatabaseContext<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseContext").finish_non_exhaustive()
    }
}

impl<C: Connection> DatabaseContext<C> {
    /// Wire a context over an open connection.
    pub fn new(connection: Arc<C>) -> Self {
        Self {
            users: SqlUserRepository::new(Arc::clone(&connection)),
            sessions: SqlSessionRepository::new(Arc::clone(&connection)),
            messages: SqlMessageRepository::new(Arc::clone(&connection)),
            connection,
        }
    }

    /// Create all tables, parents before children so the foreign keys
    /// resolve: users, then sessions, then messages.
    pub async fn initialize(&self) -> Result<(), RepositoryError> {
        self.users.create_table().await?;
        self.sessions.create_table().await?;
        self.messages.create_table().await?;
        tracing::info!("database schema ready");
        Ok(())
    }

    /// Close the underlying connection. Idempotent.
    pub async fn close(&self) -> Result<(), ConnectionError> {
        self.connection.close().await
    }

    /// The underlying connection, for transaction demarcation.
    pub fn connection(&self) -> &Arc<C> {
        &self.connection
    }
}
