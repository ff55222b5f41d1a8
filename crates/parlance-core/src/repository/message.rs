//! MessageRepository trait definition.

use parlance_types::chat::{ChatMessage, ChatTurn, NewMessage};
use parlance_types::error::RepositoryError;

/// Partial field set for [`MessageRepository::update`].
///
/// Messages carry no timestamps, so an update touches exactly the supplied
/// payload fields. An all-`None` update is a no-op and reports `false`.
#[derive(Debug, Clone, Default)]
pub struct MessageUpdate {
    pub model: Option<String>,
    pub messages: Option<Vec<ChatTurn>>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f64>,
}

impl MessageUpdate {
    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        self.model.is_none()
            && self.messages.is_none()
            && self.temperature.is_none()
            && self.max_tokens.is_none()
            && self.top_p.is_none()
    }
}

/// Repository trait for chat message persistence.
///
/// Implementations live in parlance-infra (e.g. `SqlMessageRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
///
/// Messages have no soft-delete column; deletion is physical. A message's
/// `user_id` is denormalized from its owning session and must equal it --
/// `insert` enforces this before writing anything.
pub trait MessageRepository: Send + Sync {
    /// Create the messages table if it does not exist. Safe on every
    /// startup; never destroys existing data. The sessions and users tables
    /// must exist first so the foreign keys resolve.
    fn create_table(
        &self,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Insert a message and return the backend's canonical row.
    ///
    /// Fails with `InvalidArgument` when the owning session is missing or
    /// deleted, or when the message's `user_id` does not match the
    /// session's owner.
    fn insert(
        &self,
        message: &NewMessage,
    ) -> impl std::future::Future<Output = Result<ChatMessage, RepositoryError>> + Send;

    /// Get a message by surrogate key.
    fn find_by_id(
        &self,
        message_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<ChatMessage>, RepositoryError>> + Send;

    /// All messages in a session, in insertion order (`message_id` ASC).
    fn find_by_session_id(
        &self,
        session_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;

    /// All messages owned by a user across sessions, in insertion order.
    fn find_by_user_id(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;

    /// Apply the supplied payload fields; report whether a row was
    /// affected. An empty field set returns `false` without touching the
    /// backend.
    fn update(
        &self,
        message_id: i64,
        fields: &MessageUpdate,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Remove the row. Reports whether a row matched.
    fn hard_delete(
        &self,
        message_id: i64,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Lightweight existence probe; never fetches the full row.
    fn exists(
        &self,
        message_id: i64,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Count all messages.
    fn count(&self) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Count the messages in one session.
    fn count_by_session_id(
        &self,
        session_id: i64,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
