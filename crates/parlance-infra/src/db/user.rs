//! SQL user repository.
//!
//! Implements `UserRepository` from `parlance-core` against the
//! backend-neutral `Connection` contract: raw statements with positional
//! binds, a private row struct for result mapping, and backend-assigned
//! `user_id`/`created_at` surfaced by re-reading every insert.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};

use parlance_core::connection::{Connection, SqlRow, SqlValue};
use parlance_core::repository::user::{UserRepository, UserUpdate};
use parlance_types::error::{ConnectionError, RepositoryError};
use parlance_types::identity::Identifier;
use parlance_types::user::{NewUser, PhoneNumber, User};

/// SQL implementation of `UserRepository`, generic over the backend
/// connection.
pub struct SqlUserRepository<C: Connection> {
    conn: Arc<C>,
}

impl<C: Connection> SqlUserRepository<C> {
    /// Create a new repository over the given connection.
    pub fn new(conn: Arc<C>) -> Self {
        Self { conn }
    }
}

/// `created_at` is assigned by the backend so the stored timestamp is
/// authoritative, not a client-side echo.
const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY AUTOINCREMENT,
    uuid TEXT NOT NULL UNIQUE,
    username TEXT NOT NULL UNIQUE,
    nick TEXT NOT NULL,
    phone_number_country_code INTEGER NOT NULL,
    phone_number_number INTEGER NOT NULL,
    password_hash TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT,
    deleted_at TEXT,
    oauth2 TEXT
)";

// ---------------------------------------------------------------------------
// Private Row type for backend-to-domain mapping
// ---------------------------------------------------------------------------

/// Internal row type for mapping backend rows to domain User.
struct UserRow {
    user_id: i64,
    uuid: String,
    username: String,
    nick: String,
    phone_number_country_code: i64,
    phone_number_number: i64,
    password_hash: String,
    created_at: String,
    updated_at: Option<String>,
    deleted_at: Option<String>,
    oauth2: Option<String>,
}

impl UserRow {
    fn from_row(row: &SqlRow) -> Result<Self, ConnectionError> {
        Ok(Self {
            user_id: row.try_i64("user_id")?,
            uuid: row.try_text("uuid")?,
            username: row.try_text("username")?,
            nick: row.try_text("nick")?,
            phone_number_country_code: row.try_i64("phone_number_country_code")?,
            phone_number_number: row.try_i64("phone_number_number")?,
            password_hash: row.try_text("password_hash")?,
            created_at: row.try_text("created_at")?,
            updated_at: row.opt_text("updated_at")?,
            deleted_at: row.opt_text("deleted_at")?,
            oauth2: row.opt_text("oauth2")?,
        })
    }

    fn into_user(self) -> Result<User, RepositoryError> {
        let uuid = Identifier::parse(&self.uuid)
            .map_err(|e| RepositoryError::Mapping(format!("invalid uuid column: {e}")))?;
        let created_at = parse_datetime(&self.created_at)?;
        let updated_at = self.updated_at.as_deref().map(parse_datetime).transpose()?;
        let deleted_at = self.deleted_at.as_deref().map(parse_datetime).transpose()?;
        let oauth2 = self
            .oauth2
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| RepositoryError::Mapping(format!("invalid oauth2 JSON: {e}")))?;

        Ok(User {
            user_id: self.user_id,
            uuid,
            username: self.username,
            nick: self.nick,
            phone_number: PhoneNumber {
                country_code: self.phone_number_country_code,
                number: self.phone_number_number,
            },
            password_hash: self.password_hash,
            created_at,
            updated_at,
            deleted_at,
            oauth2,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Mapping(format!("invalid datetime: {e}")))
}

/// Millisecond-precision UTC with a `Z` suffix, matching the column
/// defaults, so lexicographic and chronological ordering agree.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn backend(operation: &'static str, source: ConnectionError) -> RepositoryError {
    RepositoryError::Backend { operation, source }
}

// ---------------------------------------------------------------------------
// UserRepository implementation
// ---------------------------------------------------------------------------

impl<C: Connection> UserRepository for SqlUserRepository<C> {
    async fn create_table(&self) -> Result<(), RepositoryError> {
        self.conn
            .execute(CREATE_TABLE, &[])
            .await
            .map_err(|e| backend("users.create_table", e))?;
        Ok(())
    }

    async fn insert(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let oauth2_json = user
            .oauth2
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| RepositoryError::Mapping(format!("oauth2 payload: {e}")))?;

        let result = self
            .conn
            .execute(
                "INSERT INTO users (uuid, username, nick, phone_number_country_code, phone_number_number, password_hash, oauth2)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                &[
                    SqlValue::from(user.uuid.to_string()),
                    SqlValue::from(user.username.as_str()),
                    SqlValue::from(user.nick.as_str()),
                    SqlValue::from(user.phone_number.country_code),
                    SqlValue::from(user.phone_number.number),
                    SqlValue::from(user.password_hash.as_str()),
                    SqlValue::from(oauth2_json),
                ],
            )
            .await
            .map_err(|e| backend("users.insert", e))?;

        let row = self
            .conn
            .query_one(
                "SELECT * FROM users WHERE user_id = ?",
                &[SqlValue::from(result.last_insert_id)],
            )
            .await
            .map_err(|e| backend("users.insert", e))?;

        match row {
            Some(row) => UserRow::from_row(&row)
                .map_err(|e| backend("users.insert", e))?
                .into_user(),
            None => Err(RepositoryError::InsertFailed {
                operation: "users.insert",
            }),
        }
    }

    async fn find_by_id(&self, user_id: i64) -> Result<Option<User>, RepositoryError> {
        let row = self
            .conn
            .query_one(
                "SELECT * FROM users WHERE user_id = ? AND deleted_at IS NULL",
                &[SqlValue::from(user_id)],
            )
            .await
            .map_err(|e| backend("users.find_by_id", e))?;

        match row {
            Some(row) => {
                let user = UserRow::from_row(&row)
                    .map_err(|e| backend("users.find_by_id", e))?
                    .into_user()?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    async fn find_by_uuid(&self, uuid: &Identifier) -> Result<Option<User>, RepositoryError> {
        let row = self
            .conn
            .query_one(
                "SELECT * FROM users WHERE uuid = ? AND deleted_at IS NULL",
                &[SqlValue::from(uuid.to_string())],
            )
            .await
            .map_err(|e| backend("users.find_by_uuid", e))?;

        match row {
            Some(row) => {
                let user = UserRow::from_row(&row)
                    .map_err(|e| backend("users.find_by_uuid", e))?
                    .into_user()?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let row = self
            .conn
            .query_one(
                "SELECT * FROM users WHERE username = ? AND deleted_at IS NULL",
                &[SqlValue::from(username)],
            )
            .await
            .map_err(|e| backend("users.find_by_username", e))?;

        match row {
            Some(row) => {
                let user = UserRow::from_row(&row)
                    .map_err(|e| backend("users.find_by_username", e))?
                    .into_user()?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    async fn update(&self, user_id: i64, fields: &UserUpdate) -> Result<bool, RepositoryError> {
        if fields.is_empty() {
            return Ok(false);
        }

        let mut assignments = Vec::new();
        let mut params: Vec<SqlValue> = Vec::new();

        if let Some(nick) = &fields.nick {
            assignments.push("nick = ?");
            params.push(SqlValue::from(nick.as_str()));
        }
        if let Some(phone) = &fields.phone_number {
            assignments.push("phone_number_country_code = ?");
            params.push(SqlValue::from(phone.country_code));
            assignments.push("phone_number_number = ?");
            params.push(SqlValue::from(phone.number));
        }
        if let Some(hash) = &fields.password_hash {
            assignments.push("password_hash = ?");
            params.push(SqlValue::from(hash.as_str()));
        }
        if let Some(oauth2) = &fields.oauth2 {
            let json = serde_json::to_string(oauth2)
                .map_err(|e| RepositoryError::Mapping(format!("oauth2 payload: {e}")))?;
            assignments.push("oauth2 = ?");
            params.push(SqlValue::from(json));
        }
        assignments.push("updated_at = ?");
        params.push(SqlValue::from(format_datetime(&Utc::now())));
        params.push(SqlValue::from(user_id));

        let sql = format!(
            "UPDATE users SET {} WHERE user_id = ? AND deleted_at IS NULL",
            assignments.join(", ")
        );
        let result = self
            .conn
            .execute(&sql, &params)
            .await
            .map_err(|e| backend("users.update", e))?;

        Ok(result.rows_affected > 0)
    }

    async fn soft_delete(&self, user_id: i64) -> Result<bool, RepositoryError> {
        let now = format_datetime(&Utc::now());
        let result = self
            .conn
            .execute(
                "UPDATE users SET deleted_at = ?, updated_at = ? WHERE user_id = ? AND deleted_at IS NULL",
                &[
                    SqlValue::from(now.as_str()),
                    SqlValue::from(now.as_str()),
                    SqlValue::from(user_id),
                ],
            )
            .await
            .map_err(|e| backend("users.soft_delete", e))?;

        Ok(result.rows_affected > 0)
    }

    async fn hard_delete(&self, user_id: i64) -> Result<bool, RepositoryError> {
        let result = self
            .conn
            .execute(
                "DELETE FROM users WHERE user_id = ?",
                &[SqlValue::from(user_id)],
            )
            .await
            .map_err(|e| backend("users.hard_delete", e))?;

        Ok(result.rows_affected > 0)
    }

    async fn exists(&self, user_id: i64) -> Result<bool, RepositoryError> {
        let row = self
            .conn
            .query_one(
                "SELECT 1 AS present FROM users WHERE user_id = ? AND deleted_at IS NULL LIMIT 1",
                &[SqlValue::from(user_id)],
            )
            .await
            .map_err(|e| backend("users.exists", e))?;

        Ok(row.is_some())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let row = self
            .conn
            .query_one(
                "SELECT COUNT(*) AS cnt FROM users WHERE deleted_at IS NULL",
                &[],
            )
            .await
            .map_err(|e| backend("users.count", e))?;

        match row {
            Some(row) => {
                let count = row.try_i64("cnt").map_err(|e| backend("users.count", e))?;
                Ok(count as u64)
            }
            None => Ok(0),
        }
    }
}
