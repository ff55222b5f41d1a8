//! UserRepository trait definition.

use parlance_types::error::RepositoryError;
use parlance_types::identity::Identifier;
use parlance_types::user::{NewUser, PhoneNumber, User};

/// Partial field set for [`UserRepository::update`].
///
/// `uuid` and `username` are immutable after creation and deliberately
/// absent. An all-`None` update is a no-op and reports `false`.
#[derive(Clone, Default)]
pub struct UserUpdate {
    pub nick: Option<String>,
    pub phone_number: Option<PhoneNumber>,
    pub password_hash: Option<String>,
    pub oauth2: Option<serde_json::Value>,
}

impl std::fmt::Debug for UserUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserUpdate")
            .field("nick", &self.nick)
            .field("phone_number", &self.phone_number)
            .field(
                "password_hash",
                &self.password_hash.as_ref().map(|_| "<redacted>"),
            )
            .field("oauth2", &self.oauth2)
            .finish()
    }
}

impl UserUpdate {
    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        self.nick.is_none()
            && self.phone_number.is_none()
            && self.password_hash.is_none()
            && self.oauth2.is_none()
    }
}

/// Repository trait for user persistence.
///
/// Implementations live in parlance-infra (e.g. `SqlUserRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
///
/// Finders exclude soft-deleted rows. User deletion is terminal: unlike
/// sessions, there is no restore operation.
pub trait UserRepository: Send + Sync {
    /// Create the users table if it does not exist. Safe on every startup;
    /// never destroys existing data.
    fn create_table(
        &self,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Insert a user and return the backend's canonical row, including the
    /// assigned surrogate key and `created_at`.
    fn insert(
        &self,
        user: &NewUser,
    ) -> impl std::future::Future<Output = Result<User, RepositoryError>> + Send;

    /// Get a live user by surrogate key.
    fn find_by_id(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<User>, RepositoryError>> + Send;

    /// Get a live user by its externally-facing identifier.
    fn find_by_uuid(
        &self,
        uuid: &Identifier,
    ) -> impl std::future::Future<Output = Result<Option<User>, RepositoryError>> + Send;

    /// Get a live user by username.
    fn find_by_username(
        &self,
        username: &str,
    ) -> impl std::future::Future<Output = Result<Option<User>, RepositoryError>> + Send;

    /// Apply the supplied fields plus `updated_at`; report whether a row
    /// was affected. An empty field set returns `false` without touching
    /// the backend.
    fn update(
        &self,
        user_id: i64,
        fields: &UserUpdate,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Mark a user deleted. Reports whether a live row matched.
    fn soft_delete(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Physically remove the row, soft-deleted or not. The backend cascades
    /// the user's sessions.
    fn hard_delete(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Lightweight liveness probe; never fetches the full row.
    fn exists(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Count live users.
    fn count(&self) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
