//! User entity types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;

use crate::identity::Identifier;

/// International phone number split into dialing code and subscriber number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber {
    pub country_code: i64,
    pub number: i64,
}

/// A registered user.
///
/// `user_id` is the backend-assigned surrogate key (monotonic, never
/// reused); `uuid` is the externally-facing reference and `username` the
/// immutable business key. A user is live exactly when `deleted_at` is
/// absent -- user deletion is terminal, there is no restore path.
#[derive(Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub uuid: Identifier,
    pub username: String,
    pub nick: String,
    pub phone_number: PhoneNumber,
    /// Opaque credential digest. Kept out of Debug output.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    /// Opaque OAuth2 payload, stored and returned verbatim.
    pub oauth2: Option<serde_json::Value>,
}

impl User {
    /// Whether this user has not been soft-deleted.
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("user_id", &self.user_id)
            .field("uuid", &self.uuid)
            .field("username", &self.username)
            .field("nick", &self.nick)
            .field("phone_number", &self.phone_number)
            .field("password_hash", &"<redacted>")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .field("deleted_at", &self.deleted_at)
            .field("oauth2", &self.oauth2)
            .finish()
    }
}

/// Caller-supplied fields for inserting a user.
///
/// The backend assigns `user_id` and `created_at`; the caller must already
/// hold a generated [`Identifier`].
#[derive(Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub uuid: Identifier,
    pub username: String,
    pub nick: String,
    pub phone_number: PhoneNumber,
    pub password_hash: String,
    pub oauth2: Option<serde_json::Value>,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("uuid", &self.uuid)
            .field("username", &self.username)
            .field("nick", &self.nick)
            .field("phone_number", &self.phone_number)
            .field("password_hash", &"<redacted>")
            .field("oauth2", &self.oauth2)
            .finish()
    }
}
