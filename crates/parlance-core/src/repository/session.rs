//! SessionRepository trait definition.

use parlance_types::chat::{ChatSession, NewSession};
use parlance_types::error::RepositoryError;

/// Repository trait for chat session persistence.
///
/// Implementations live in parlance-infra (e.g. `SqlSessionRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
///
/// Sessions carry no mutable business columns, so the partial-update
/// surface reduces to [`SessionRepository::touch`], which refreshes
/// `updated_at` (the activity-recency signal). Unlike users, sessions
/// support a reversible soft-delete/restore cycle.
pub trait SessionRepository: Send + Sync {
    /// Create the sessions table if it does not exist. Safe on every
    /// startup; never destroys existing data. The users table must exist
    /// first so the foreign key resolves.
    fn create_table(
        &self,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Insert a session and return the backend's canonical row.
    fn insert(
        &self,
        session: &NewSession,
    ) -> impl std::future::Future<Output = Result<ChatSession, RepositoryError>> + Send;

    /// Get a live session by surrogate key.
    fn find_by_id(
        &self,
        session_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<ChatSession>, RepositoryError>> + Send;

    /// All live sessions for a user, ordered by `created_at` DESC
    /// (creation order).
    fn find_by_user_id(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<ChatSession>, RepositoryError>> + Send;

    /// Most recently active live sessions for a user, ordered by activity
    /// recency (`updated_at`, falling back to `created_at`) DESC.
    ///
    /// This ordering is deliberately different from
    /// [`SessionRepository::find_by_user_id`] and must not be unified with
    /// it. Fails with `InvalidArgument` when `limit <= 0`.
    fn find_recent_by_user_id(
        &self,
        user_id: i64,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<ChatSession>, RepositoryError>> + Send;

    /// Refresh `updated_at` on a live session; reports whether a row
    /// matched.
    fn touch(
        &self,
        session_id: i64,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Mark a session deleted. Reports whether a live row matched.
    fn soft_delete(
        &self,
        session_id: i64,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Clear `deleted_at` on a soft-deleted session and refresh
    /// `updated_at`; reports whether a deleted row matched.
    fn restore(
        &self,
        session_id: i64,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Physically remove the row, soft-deleted or not.
    fn hard_delete(
        &self,
        session_id: i64,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Lightweight liveness probe; never fetches the full row.
    fn exists(
        &self,
        session_id: i64,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Count live sessions.
    fn count(&self) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
