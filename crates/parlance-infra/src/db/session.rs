//! SQL session repository.
//!
//! Implements `SessionRepository` from `parlance-core`. Follows the same
//! patterns as `SqlUserRepository`: raw statements, a private Row struct,
//! insert-then-re-read for backend-assigned columns.
//!
//! Two orderings coexist on purpose: `find_by_user_id` lists by creation
//! (`created_at` DESC) while `find_recent_by_user_id` lists by activity
//! (`updated_at`, falling back to `created_at`, DESC).

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};

use parlance_core::connection::{Connection, SqlRow, SqlValue};
use parlance_core::repository::session::SessionRepository;
use parlance_types::chat::{ChatSession, NewSession};
use parlance_types::error::{ConnectionError, RepositoryError};

/// SQL implementation of `SessionRepository`, generic over the backend
/// connection.
pub struct SqlSessionRepository<C: Connection> {
    conn: Arc<C>,
}

impl<C: Connection> SqlSessionRepository<C> {
    /// Create a new repository over the given connection.
    pub fn new(conn: Arc<C>) -> Self {
        Self { conn }
    }
}

/// Deleting a user cascades its sessions through the foreign key's
/// referential action, not application logic.
const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS sessions (
    session_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users (user_id) ON DELETE CASCADE,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT,
    deleted_at TEXT
)";

const CREATE_USER_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions (user_id)";

/// Internal row type for mapping backend rows to domain ChatSession.
struct SessionRow {
    session_id: i64,
    user_id: i64,
    created_at: String,
    updated_at: Option<String>,
    deleted_at: Option<String>,
}

impl SessionRow {
    fn from_row(row: &SqlRow) -> Result<Self, ConnectionError> {
        Ok(Self {
            session_id: row.try_i64("session_id")?,
            user_id: row.try_i64("user_id")?,
            created_at: row.try_text("created_at")?,
            updated_at: row.opt_text("updated_at")?,
            deleted_at: row.opt_text("deleted_at")?,
        })
    }

    fn into_session(self) -> Result<ChatSession, RepositoryError> {
        Ok(ChatSession {
            session_id: self.session_id,
            user_id: self.user_id,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: self.updated_at.as_deref().map(parse_datetime).transpose()?,
            deleted_at: self.deleted_at.as_deref().map(parse_datetime).transpose()?,
        })
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Mapping(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn backend(operation: &'static str, source: ConnectionError) -> RepositoryError {
    RepositoryError::Backend { operation, source }
}

impl<C: Connection> SessionRepository for SqlSessionRepository<C> {
    async fn create_table(&self) -> Result<(), RepositoryError> {
        self.conn
            .execute(CREATE_TABLE, &[])
            .await
            .map_err(|e| backend("sessions.create_table", e))?;
        self.conn
            .execute(CREATE_USER_INDEX, &[])
            .await
            .map_err(|e| backend("sessions.create_table", e))?;
        Ok(())
    }

    async fn insert(&self, session: &NewSession) -> Result<ChatSession, RepositoryError> {
        let result = self
            .conn
            .execute(
                "INSERT INTO sessions (user_id) VALUES (?)",
                &[SqlValue::from(session.user_id)],
            )
            .await
            .map_err(|e| backend("sessions.insert", e))?;

        let row = self
            .conn
            .query_one(
                "SELECT * FROM sessions WHERE session_id = ?",
                &[SqlValue::from(result.last_insert_id)],
            )
            .await
            .map_err(|e| backend("sessions.insert", e))?;

        match row {
            Some(row) => SessionRow::from_row(&row)
                .map_err(|e| backend("sessions.insert", e))?
                .into_session(),
            None => Err(RepositoryError::InsertFailed {
                operation: "sessions.insert",
            }),
        }
    }

    async fn find_by_id(&self, session_id: i64) -> Result<Option<ChatSession>, RepositoryError> {
        let row = self
            .conn
            .query_one(
                "SELECT * FROM sessions WHERE session_id = ? AND deleted_at IS NULL",
                &[SqlValue::from(session_id)],
            )
            .await
            .map_err(|e| backend("sessions.find_by_id", e))?;

        match row {
            Some(row) => {
                let session = SessionRow::from_row(&row)
                    .map_err(|e| backend("sessions.find_by_id", e))?
                    .into_session()?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    async fn find_by_user_id(&self, user_id: i64) -> Result<Vec<ChatSession>, RepositoryError> {
        let rows = self
            .conn
            .query(
                "SELECT * FROM sessions WHERE user_id = ? AND deleted_at IS NULL
                 ORDER BY created_at DESC, session_id DESC",
                &[SqlValue::from(user_id)],
            )
            .await
            .map_err(|e| backend("sessions.find_by_user_id", e))?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in &rows {
            let session = SessionRow::from_row(row)
                .map_err(|e| backend("sessions.find_by_user_id", e))?
                .into_session()?;
            sessions.push(session);
        }
        Ok(sessions)
    }

    async fn find_recent_by_user_id(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<ChatSession>, RepositoryError> {
        if limit <= 0 {
            return Err(RepositoryError::InvalidArgument(format!(
                "limit must be positive, got {limit}"
            )));
        }

        let rows = self
            .conn
            .query(
                "SELECT * FROM sessions WHERE user_id = ? AND deleted_at IS NULL
                 ORDER BY COALESCE(updated_at, created_at) DESC, session_id DESC LIMIT ?",
                &[SqlValue::from(user_id), SqlValue::from(limit)],
            )
            .await
            .map_err(|e| backend("sessions.find_recent_by_user_id", e))?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in &rows {
            let session = SessionRow::from_row(row)
                .map_err(|e| backend("sessions.find_recent_by_user_id", e))?
                .into_session()?;
            sessions.push(session);
        }
        Ok(sessions)
    }

    async fn touch(&self, session_id: i64) -> Result<bool, RepositoryError> {
        let result = self
            .conn
            .execute(
                "UPDATE sessions SET updated_at = ? WHERE session_id = ? AND deleted_at IS NULL",
                &[
                    SqlValue::from(format_datetime(&Utc::now())),
                    SqlValue::from(session_id),
                ],
            )
            .await
            .map_err(|e| backend("sessions.touch", e))?;

        Ok(result.rows_affected > 0)
    }

    async fn soft_delete(&self, session_id: i64) -> Result<bool, RepositoryError> {
        let now = format_datetime(&Utc::now());
        let result = self
            .conn
            .execute(
                "UPDATE sessions SET deleted_at = ?, updated_at = ? WHERE session_id = ? AND deleted_at IS NULL",
                &[
                    SqlValue::from(now.as_str()),
                    SqlValue::from(now.as_str()),
                    SqlValue::from(session_id),
                ],
            )
            .await
            .map_err(|e| backend("sessions.soft_delete", e))?;

        Ok(result.rows_affected > 0)
    }

    async fn restore(&self, session_id: i64) -> Result<bool, RepositoryError> {
        let result = self
            .conn
            .execute(
                "UPDATE sessions SET deleted_at = NULL, updated_at = ? WHERE session_id = ? AND deleted_at IS NOT NULL",
                &[
                    SqlValue::from(format_datetime(&Utc::now())),
                    SqlValue::from(session_id),
                ],
            )
            .await
            .map_err(|e| backend("sessions.restore", e))?;

        Ok(result.rows_affected > 0)
    }

    async fn hard_delete(&self, session_id: i64) -> Result<bool, RepositoryError> {
        let result = self
            .conn
            .execute(
                "DELETE FROM sessions WHERE session_id = ?",
                &[SqlValue::from(session_id)],
            )
            .await
            .map_err(|e| backend("sessions.hard_delete", e))?;

        Ok(result.rows_affected > 0)
    }

    async fn exists(&self, session_id: i64) -> Result<bool, RepositoryError> {
        let row = self
            .conn
            .query_one(
                "SELECT 1 AS present FROM sessions WHERE session_id = ? AND deleted_at IS NULL LIMIT 1",
                &[SqlValue::from(session_id)],
            )
            .await
            .map_err(|e| backend("sessions.exists", e))?;

        Ok(row.is_some())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let row = self
            .conn
            .query_one(
                "SELECT COUNT(*) AS cnt FROM sessions WHERE deleted_at IS NULL",
                &[],
            )
            .await
            .map_err(|e| backend("sessions.count", e))?;

        match row {
            Some(row) => {
                let count = row
                    .try_i64("cnt")
                    .map_err(|e| backend("sessions.count", e))?;
                Ok(count as u64)
            }
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::SqliteConnection;
    use crate::db::user::SqlUserRepository;
    use parlance_core::repository::user::UserRepository;
    use parlance_types::config::DatabaseConfig;
    use parlance_types::identity::Identifier;
    use parlance_types::user::{NewUser, PhoneNumber};
    use std::time::Duration;

    async fn test_repos() -> (
        SqlUserRepository<SqliteConnection>,
        SqlSessionRepository<SqliteConnection>,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        // Leak tempdir so it lives for the test
        std::mem::forget(dir);
        let conn = Arc::new(
            SqliteConnection::connect(&DatabaseConfig::new(url))
                .await
                .unwrap(),
        );
        let users = SqlUserRepository::new(Arc::clone(&conn));
        let sessions = SqlSessionRepository::new(conn);
        users.create_table().await.unwrap();
        sessions.create_table().await.unwrap();
        (users, sessions)
    }

    async fn seed_user(users: &SqlUserRepository<SqliteConnection>, username: &str) -> i64 {
        users
            .insert(&NewUser {
                uuid: Identifier::generate(),
                username: username.to_string(),
                nick: username.to_string(),
                phone_number: PhoneNumber {
                    country_code: 1,
                    number: 5550000,
                },
                password_hash: "$argon2id$v=19$stub".to_string(),
                oauth2: None,
            })
            .await
            .unwrap()
            .user_id
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let (users, sessions) = test_repos().await;
        let user_id = seed_user(&users, "alice").await;

        let session = sessions.insert(&NewSession { user_id }).await.unwrap();
        assert!(session.session_id > 0);
        assert_eq!(session.user_id, user_id);
        assert!(session.updated_at.is_none());
        assert!(session.deleted_at.is_none());

        let found = sessions.find_by_id(session.session_id).await.unwrap().unwrap();
        assert_eq!(found.session_id, session.session_id);
        assert_eq!(found.created_at, session.created_at);
    }

    #[tokio::test]
    async fn test_insert_requires_existing_user() {
        let (_users, sessions) = test_repos().await;
        let err = sessions.insert(&NewSession { user_id: 9999 }).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Backend { .. }));
    }

    #[tokio::test]
    async fn test_find_by_user_id_orders_by_creation() {
        let (users, sessions) = test_repos().await;
        let user_id = seed_user(&users, "alice").await;

        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(sessions.insert(&NewSession { user_id }).await.unwrap().session_id);
        }

        let listed = sessions.find_by_user_id(user_id).await.unwrap();
        assert_eq!(listed.len(), 3);
        // Newest creation first.
        let listed_ids: Vec<i64> = listed.iter().map(|s| s.session_id).collect();
        let mut expected = ids.clone();
        expected.reverse();
        assert_eq!(listed_ids, expected);
    }

    #[tokio::test]
    async fn test_find_recent_orders_by_activity() {
        let (users, sessions) = test_repos().await;
        let user_id = seed_user(&users, "alice").await;

        let first = sessions.insert(&NewSession { user_id }).await.unwrap();
        let second = sessions.insert(&NewSession { user_id }).await.unwrap();
        let third = sessions.insert(&NewSession { user_id }).await.unwrap();

        // Touching the oldest session makes it the most recently active.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(sessions.touch(first.session_id).await.unwrap());

        let recent = sessions.find_recent_by_user_id(user_id, 10).await.unwrap();
        let ids: Vec<i64> = recent.iter().map(|s| s.session_id).collect();
        assert_eq!(
            ids,
            vec![first.session_id, third.session_id, second.session_id]
        );

        let limited = sessions.find_recent_by_user_id(user_id, 2).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].session_id, first.session_id);
    }

    #[tokio::test]
    async fn test_find_recent_rejects_non_positive_limit() {
        let (_users, sessions) = test_repos().await;
        for limit in [0, -1] {
            let err = sessions.find_recent_by_user_id(1, limit).await.unwrap_err();
            assert!(matches!(err, RepositoryError::InvalidArgument(_)));
        }
    }

    #[tokio::test]
    async fn test_soft_delete_restore_cycle() {
        let (users, sessions) = test_repos().await;
        let user_id = seed_user(&users, "alice").await;
        let session = sessions.insert(&NewSession { user_id }).await.unwrap();

        assert!(sessions.soft_delete(session.session_id).await.unwrap());
        assert!(sessions.find_by_id(session.session_id).await.unwrap().is_none());
        assert!(sessions.find_by_user_id(user_id).await.unwrap().is_empty());

        // Restore only matches deleted rows.
        assert!(sessions.restore(session.session_id).await.unwrap());
        assert!(!sessions.restore(session.session_id).await.unwrap());

        let restored = sessions.find_by_id(session.session_id).await.unwrap().unwrap();
        assert!(restored.deleted_at.is_none());
        assert!(restored.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_hard_delete_works_on_soft_deleted_rows() {
        let (users, sessions) = test_repos().await;
        let user_id = seed_user(&users, "alice").await;
        let session = sessions.insert(&NewSession { user_id }).await.unwrap();

        assert!(sessions.soft_delete(session.session_id).await.unwrap());
        assert!(sessions.hard_delete(session.session_id).await.unwrap());
        assert!(!sessions.restore(session.session_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_user_hard_delete_cascades_sessions() {
        let (users, sessions) = test_repos().await;
        let user_id = seed_user(&users, "alice").await;

        sessions.insert(&NewSession { user_id }).await.unwrap();
        sessions.insert(&NewSession { user_id }).await.unwrap();
        assert_eq!(sessions.count().await.unwrap(), 2);

        assert!(users.hard_delete(user_id).await.unwrap());

        assert!(sessions.find_by_user_id(user_id).await.unwrap().is_empty());
        assert_eq!(sessions.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_touch_refreshes_updated_at() {
        let (users, sessions) = test_repos().await;
        let user_id = seed_user(&users, "alice").await;
        let session = sessions.insert(&NewSession { user_id }).await.unwrap();
        assert!(session.updated_at.is_none());

        assert!(sessions.touch(session.session_id).await.unwrap());
        let touched = sessions.find_by_id(session.session_id).await.unwrap().unwrap();
        assert!(touched.updated_at.is_some());

        // Touching a missing session matches nothing.
        assert!(!sessions.touch(9999).await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_and_count_exclude_soft_deleted() {
        let (users, sessions) = test_repos().await;
        let user_id = seed_user(&users, "alice").await;
        let session = sessions.insert(&NewSession { user_id }).await.unwrap();

        assert!(sessions.exists(session.session_id).await.unwrap());
        assert_eq!(sessions.count().await.unwrap(), 1);

        sessions.soft_delete(session.session_id).await.unwrap();
        assert!(!sessions.exists(session.session_id).await.unwrap());
        assert_eq!(sessions.count().await.unwrap(), 0);
    }
}
