//! SQL message repository.
//!
//! Implements `MessageRepository` from `parlance-core`. A message row is a
//! completion-request payload (model, serialized turns, sampling
//! parameters) bound to its session and -- denormalized for query locality
//! -- the session's owning user. `insert` re-checks that denormalization
//! against the live session before writing so the copy can never drift.

use std::sync::Arc;

use parlance_core::connection::{Connection, SqlRow, SqlValue};
use parlance_core::repository::message::{MessageRepository, MessageUpdate};
use parlance_types::chat::{ChatMessage, ChatRequest, ChatTurn, NewMessage};
use parlance_types::error::{ConnectionError, RepositoryError};

/// SQL implementation of `MessageRepository`, generic over the backend
/// connection.
pub struct SqlMessageRepository<C: Connection> {
    conn: Arc<C>,
}

impl<C: Connection> SqlMessageRepository<C> {
    /// Create a new repository over the given connection.
    pub fn new(conn: Arc<C>) -> Self {
        Self { conn }
    }
}

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS messages (
    message_id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL REFERENCES sessions (session_id) ON DELETE CASCADE,
    user_id INTEGER NOT NULL REFERENCES users (user_id) ON DELETE CASCADE,
    model TEXT NOT NULL,
    messages TEXT NOT NULL,
    temperature REAL,
    max_tokens INTEGER,
    top_p REAL
)";

const CREATE_SESSION_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_messages_session_id ON messages (session_id)";
const CREATE_USER_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_messages_user_id ON messages (user_id)";

/// Internal row type for mapping backend rows to domain ChatMessage.
struct MessageRow {
    message_id: i64,
    session_id: i64,
    user_id: i64,
    model: String,
    messages: String,
    temperature: Option<f64>,
    max_tokens: Option<i64>,
    top_p: Option<f64>,
}

impl MessageRow {
    fn from_row(row: &SqlRow) -> Result<Self, ConnectionError> {
        Ok(Self {
            message_id: row.try_i64("message_id")?,
            session_id: row.try_i64("session_id")?,
            user_id: row.try_i64("user_id")?,
            model: row.try_text("model")?,
            messages: row.try_text("messages")?,
            temperature: row.opt_f64("temperature")?,
            max_tokens: row.opt_i64("max_tokens")?,
            top_p: row.opt_f64("top_p")?,
        })
    }

    fn into_message(self) -> Result<ChatMessage, RepositoryError> {
        let turns: Vec<ChatTurn> = serde_json::from_str(&self.messages)
            .map_err(|e| RepositoryError::Mapping(format!("invalid messages JSON: {e}")))?;

        Ok(ChatMessage {
            message_id: self.message_id,
            session_id: self.session_id,
            user_id: self.user_id,
            request: ChatRequest {
                model: self.model,
                messages: turns,
                temperature: self.temperature,
                max_tokens: self.max_tokens.map(|v| v as u32),
                top_p: self.top_p,
            },
        })
    }
}

fn backend(operation: &'static str, source: ConnectionError) -> RepositoryError {
    RepositoryError::Backend { operation, source }
}

fn turns_json(turns: &[ChatTurn]) -> Result<String, RepositoryError> {
    serde_json::to_string(turns)
        .map_err(|e| RepositoryError::Mapping(format!("messages payload: {e}")))
}

impl<C: Connection> MessageRepository for SqlMessageRepository<C> {
    async fn create_table(&self) -> Result<(), RepositoryError> {
        self.conn
            .execute(CREATE_TABLE, &[])
            .await
            .map_err(|e| backend("messages.create_table", e))?;
        self.conn
            .execute(CREATE_SESSION_INDEX, &[])
            .await
            .map_err(|e| backend("messages.create_table", e))?;
        self.conn
            .execute(CREATE_USER_INDEX, &[])
            .await
            .map_err(|e| backend("messages.create_table", e))?;
        Ok(())
    }

    async fn insert(&self, message: &NewMessage) -> Result<ChatMessage, RepositoryError> {
        // The denormalized user_id must match the owning session before
        // anything is written.
        let owner = self
            .conn
            .query_one(
                "SELECT user_id FROM sessions WHERE session_id = ? AND deleted_at IS NULL",
                &[SqlValue::from(message.session_id)],
            )
            .await
            .map_err(|e| backend("messages.insert", e))?;

        let Some(owner) = owner else {
            return Err(RepositoryError::InvalidArgument(format!(
                "session {} does not exist or is deleted",
                message.session_id
            )));
        };
        let owner_id = owner
            .try_i64("user_id")
            .map_err(|e| backend("messages.insert", e))?;
        if owner_id != message.user_id {
            return Err(RepositoryError::InvalidArgument(format!(
                "message user_id {} does not match session owner {owner_id}",
                message.user_id
            )));
        }

        let turns = turns_json(&message.request.messages)?;
        let result = self
            .conn
            .execute(
                "INSERT INTO messages (session_id, user_id, model, messages, temperature, max_tokens, top_p)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                &[
                    SqlValue::from(message.session_id),
                    SqlValue::from(message.user_id),
                    SqlValue::from(message.request.model.as_str()),
                    SqlValue::from(turns),
                    SqlValue::from(message.request.temperature),
                    SqlValue::from(message.request.max_tokens),
                    SqlValue::from(message.request.top_p),
                ],
            )
            .await
            .map_err(|e| backend("messages.insert", e))?;

        let row = self
            .conn
            .query_one(
                "SELECT * FROM messages WHERE message_id = ?",
                &[SqlValue::from(result.last_insert_id)],
            )
            .await
            .map_err(|e| backend("messages.insert", e))?;

        match row {
            Some(row) => MessageRow::from_row(&row)
                .map_err(|e| backend("messages.insert", e))?
                .into_message(),
            None => Err(RepositoryError::InsertFailed {
                operation: "messages.insert",
            }),
        }
    }

    async fn find_by_id(&self, message_id: i64) -> Result<Option<ChatMessage>, RepositoryError> {
        let row = self
            .conn
            .query_one(
                "SELECT * FROM messages WHERE message_id = ?",
                &[SqlValue::from(message_id)],
            )
            .await
            .map_err(|e| backend("messages.find_by_id", e))?;

        match row {
            Some(row) => {
                let message = MessageRow::from_row(&row)
                    .map_err(|e| backend("messages.find_by_id", e))?
                    .into_message()?;
                Ok(Some(message))
            }
            None => Ok(None),
        }
    }

    async fn find_by_session_id(
        &self,
        session_id: i64,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = self
            .conn
            .query(
                "SELECT * FROM messages WHERE session_id = ? ORDER BY message_id ASC",
                &[SqlValue::from(session_id)],
            )
            .await
            .map_err(|e| backend("messages.find_by_session_id", e))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let message = MessageRow::from_row(row)
                .map_err(|e| backend("messages.find_by_session_id", e))?
                .into_message()?;
            messages.push(message);
        }
        Ok(messages)
    }

    async fn find_by_user_id(&self, user_id: i64) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = self
            .conn
            .query(
                "SELECT * FROM messages WHERE user_id = ? ORDER BY message_id ASC",
                &[SqlValue::from(user_id)],
            )
            .await
            .map_err(|e| backend("messages.find_by_user_id", e))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let message = MessageRow::from_row(row)
                .map_err(|e| backend("messages.find_by_user_id", e))?
                .into_message()?;
            messages.push(message);
        }
        Ok(messages)
    }

    async fn update(
        &self,
        message_id: i64,
        fields: &MessageUpdate,
    ) -> Result<bool, RepositoryError> {
        if fields.is_empty() {
            return Ok(false);
        }

        let mut assignments = Vec::new();
        let mut params: Vec<SqlValue> = Vec::new();

        if let Some(model) = &fields.model {
            assignments.push("model = ?");
            params.push(SqlValue::from(model.as_str()));
        }
        if let Some(turns) = &fields.messages {
            assignments.push("messages = ?");
            params.push(SqlValue::from(turns_json(turns)?));
        }
        if let Some(temperature) = fields.temperature {
            assignments.push("temperature = ?");
            params.push(SqlValue::from(temperature));
        }
        if let Some(max_tokens) = fields.max_tokens {
            assignments.push("max_tokens = ?");
            params.push(SqlValue::from(max_tokens));
        }
        if let Some(top_p) = fields.top_p {
            assignments.push("top_p = ?");
            params.push(SqlValue::from(top_p));
        }
        params.push(SqlValue::from(message_id));

        let sql = format!(
            "UPDATE messages SET {} WHERE message_id = ?",
            assignments.join(", ")
        );
        let result = self
            .conn
            .execute(&sql, &params)
            .await
            .map_err(|e| backend("messages.update", e))?;

        Ok(result.rows_affected > 0)
    }

    async fn hard_delete(&self, message_id: i64) -> Result<bool, RepositoryError> {
        let result = self
            .conn
            .execute(
                "DELETE FROM messages WHERE message_id = ?",
                &[SqlValue::from(message_id)],
            )
            .await
            .map_err(|e| backend("messages.hard_delete", e))?;

        Ok(result.rows_affected > 0)
    }

    async fn exists(&self, message_id: i64) -> Result<bool, RepositoryError> {
        let row = self
            .conn
            .query_one(
                "SELECT 1 AS present FROM messages WHERE message_id = ? LIMIT 1",
                &[SqlValue::from(message_id)],
            )
            .await
            .map_err(|e| backend("messages.exists", e))?;

        Ok(row.is_some())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let row = self
            .conn
            .query_one("SELECT COUNT(*) AS cnt FROM messages", &[])
            .await
            .map_err(|e| backend("messages.count", e))?;

        match row {
            Some(row) => {
                let count = row
                    .try_i64("cnt")
                    .map_err(|e| backend("messages.count", e))?;
                Ok(count as u64)
            }
            None => Ok(0),
        }
    }

    async fn count_by_session_id(&self, session_id: i64) -> Result<u64, RepositoryError> {
        let row = self
            .conn
            .query_one(
                "SELECT COUNT(*) AS cnt FROM messages WHERE session_id = ?",
                &[SqlValue::from(session_id)],
            )
            .await
            .map_err(|e| backend("messages.count_by_session_id", e))?;

        match row {
            Some(row) => {
                let count = row
                    .try_i64("cnt")
                    .map_err(|e| backend("messages.count_by_session_id", e))?;
                Ok(count as u64)
            }
            None => Ok(0),
        }
    }
}
