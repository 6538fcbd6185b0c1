use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use thiserror::Error;
use tokio::sync::RwLock;

use coco_core::domain::turn::{Role, Turn};

use crate::DbPool;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Append-only ordered-turn store. Sessions are implicit: the first append
/// for a session id creates it, and nothing here ever deletes one.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, session_id: &str, role: Role, text: &str) -> Result<(), StoreError>;

    /// Most recent `limit` turns, returned oldest-first.
    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<Turn>, StoreError>;
}

pub struct SqlHistoryStore {
    pool: DbPool,
}

impl SqlHistoryStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryStore for SqlHistoryStore {
    async fn append(&self, session_id: &str, role: Role, text: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO turns (session_id, role, body, created_at) VALUES (?, ?, ?, ?)")
            .bind(session_id)
            .bind(role.as_str())
            .bind(text)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<Turn>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, session_id, role, body, created_at FROM turns \
             WHERE session_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut turns = Vec::with_capacity(rows.len());
        for row in rows {
            let role_label: String = row.get("role");
            let role = Role::parse(&role_label)
                .ok_or_else(|| StoreError::Decode(format!("unknown role `{role_label}`")))?;
            let created_at_raw: String = row.get("created_at");
            let created_at = DateTime::parse_from_rfc3339(&created_at_raw)
                .map_err(|error| StoreError::Decode(format!("bad created_at: {error}")))?
                .with_timezone(&Utc);

            turns.push(Turn {
                session_id: row.get("session_id"),
                role,
                text: row.get("body"),
                creation_order: row.get::<i64, _>("id"),
                created_at,
            });
        }

        // The store hands back most-recent-first; callers always consume
        // oldest-first.
        turns.reverse();
        Ok(turns)
    }
}

#[derive(Default)]
pub struct InMemoryHistoryStore {
    sessions: RwLock<HashMap<String, Vec<Turn>>>,
    next_order: RwLock<i64>,
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(&self, session_id: &str, role: Role, text: &str) -> Result<(), StoreError> {
        let mut next_order = self.next_order.write().await;
        *next_order += 1;
        let turn = Turn {
            session_id: session_id.to_string(),
            role,
            text: text.to_string(),
            creation_order: *next_order,
            created_at: Utc::now(),
        };
        drop(next_order);

        let mut sessions = self.sessions.write().await;
        sessions.entry(session_id.to_string()).or_default().push(turn);
        Ok(())
    }

    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<Turn>, StoreError> {
        let sessions = self.sessions.read().await;
        let turns = sessions.get(session_id).cloned().unwrap_or_default();
        let start = turns.len().saturating_sub(limit);
        Ok(turns[start..].to_vec())
    }
}
