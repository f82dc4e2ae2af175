use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use delver_core::error::{DelverError, Result};
use delver_core::traits::SessionStore;
use delver_core::types::{ChatMessage, Role, SessionId};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL,
        role TEXT NOT NULL,
        content TEXT NOT NULL,
        timestamp TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_messages_session
        ON messages(session_id, id);

    CREATE TABLE IF NOT EXISTS summaries (
        session_id TEXT PRIMARY KEY,
        summary TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );";

fn db_err(e: impl std::fmt::Display) -> DelverError {
    DelverError::Database(e.to_string())
}

/// SQLite-backed conversation store: one row per message plus the latest
/// summary per session.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DelverError::Database(format!("Failed to create db directory: {}", e)))?;
        }

        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        debug!(path = %path.display(), "SQLite store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of stored messages for a session.
    pub fn message_count(&self, sid: &SessionId) -> Result<usize> {
        let conn = self.conn.lock().map_err(db_err)?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM messages WHERE session_id = ?1",
                params![sid.as_str()],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(count as usize)
    }
}

impl SessionStore for SqliteStore {
    fn append_messages(&self, sid: &SessionId, msgs: &[ChatMessage]) -> BoxFuture<'_, Result<()>> {
        let sid = sid.as_str().to_string();
        let rows: Vec<_> = msgs
            .iter()
            .map(|m| {
                let timestamp = m.timestamp.unwrap_or_else(Utc::now).to_rfc3339();
                (m.role.as_str(), m.content.clone(), timestamp)
            })
            .collect();

        Box::pin(async move {
            let mut conn = self.conn.lock().map_err(db_err)?;
            let tx = conn.transaction().map_err(db_err)?;
            for (role, content, timestamp) in &rows {
                tx.execute(
                    "INSERT INTO messages (session_id, role, content, timestamp) VALUES (?1, ?2, ?3, ?4)",
                    params![sid, role, content, timestamp],
                )
                .map_err(db_err)?;
            }
            tx.commit().map_err(db_err)?;
            Ok(())
        })
    }

    fn load_history(
        &self,
        sid: &SessionId,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<ChatMessage>>> {
        let sid = sid.as_str().to_string();

        Box::pin(async move {
            let conn = self.conn.lock().map_err(db_err)?;

            // Newest `limit` rows, returned oldest first.
            let mut stmt = conn
                .prepare(
                    "SELECT role, content, timestamp FROM (
                         SELECT id, role, content, timestamp FROM messages
                         WHERE session_id = ?1
                         ORDER BY id DESC
                         LIMIT ?2
                     ) ORDER BY id ASC",
                )
                .map_err(db_err)?;

            let rows = stmt
                .query_map(params![sid, limit as i64], |row| {
                    let role: String = row.get(0)?;
                    let content: String = row.get(1)?;
                    let ts: String = row.get(2)?;
                    Ok((role, content, ts))
                })
                .map_err(db_err)?;

            let mut messages = Vec::new();
            for row in rows {
                let (role, content, ts) = row.map_err(db_err)?;
                messages.push(ChatMessage {
                    role: Role::from_tag(&role),
                    content,
                    timestamp: DateTime::parse_from_rfc3339(&ts)
                        .ok()
                        .map(|dt| dt.with_timezone(&Utc)),
                });
            }

            Ok(messages)
        })
    }

    fn load_summary(&self, sid: &SessionId) -> BoxFuture<'_, Result<Option<String>>> {
        let sid = sid.as_str().to_string();

        Box::pin(async move {
            let conn = self.conn.lock().map_err(db_err)?;
            conn.query_row(
                "SELECT summary FROM summaries WHERE session_id = ?1",
                params![sid],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)
        })
    }

    fn save_summary(&self, sid: &SessionId, summary: &str) -> BoxFuture<'_, Result<()>> {
        let sid = sid.as_str().to_string();
        let summary = summary.to_string();

        Box::pin(async move {
            let conn = self.conn.lock().map_err(db_err)?;
            conn.execute(
                "INSERT INTO summaries (session_id, summary, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(session_id) DO UPDATE SET summary = excluded.summary,
                                                       updated_at = excluded.updated_at",
                params![sid, summary, Utc::now().to_rfc3339()],
            )
            .map_err(db_err)?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_and_retrieve() {
        let store = SqliteStore::in_memory().unwrap();
        let sid = SessionId::new();

        let msgs = vec![ChatMessage::user("Hello"), ChatMessage::assistant("Hi there!")];
        store.append_messages(&sid, &msgs).await.unwrap();

        let history = store.load_history(&sid, 100).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].content, "Hi there!");
        assert!(history[1].timestamp.is_some());
    }

    #[tokio::test]
    async fn test_history_limit_keeps_newest() {
        let store = SqliteStore::in_memory().unwrap();
        let sid = SessionId::new();
        for i in 0..5 {
            store
                .append_messages(&sid, &[ChatMessage::user(format!("m{}", i))])
                .await
                .unwrap();
        }

        let history = store.load_history(&sid, 2).await.unwrap();
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["m3", "m4"]);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = SqliteStore::in_memory().unwrap();
        let a = SessionId::from_string("a");
        let b = SessionId::from_string("b");
        store.append_messages(&a, &[ChatMessage::user("for a")]).await.unwrap();

        assert!(store.load_history(&b, 10).await.unwrap().is_empty());
        assert_eq!(store.message_count(&a).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_summary_upsert() {
        let store = SqliteStore::in_memory().unwrap();
        let sid = SessionId::new();

        assert_eq!(store.load_summary(&sid).await.unwrap(), None);
        store.save_summary(&sid, "first").await.unwrap();
        store.save_summary(&sid, "second").await.unwrap();
        assert_eq!(store.load_summary(&sid).await.unwrap().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_reopen_file_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sessions.db");
        let sid = SessionId::from_string("persist");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.append_messages(&sid, &[ChatMessage::user("kept")]).await.unwrap();
            store.save_summary(&sid, "summary").await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.load_history(&sid, 10).await.unwrap()[0].content, "kept");
        assert_eq!(store.load_summary(&sid).await.unwrap().as_deref(), Some("summary"));
    }
}
