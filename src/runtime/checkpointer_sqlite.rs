//! SQLite-backed durable checkpoint store.
//!
//! Stores the full per-thread checkpoint history in two tables:
//!
//! - `threads.id` / `threads.last_seq`: one row per thread, tracking the
//!   highest saved sequence for the monotonicity check.
//! - `checkpoints`: one row per `(thread_id, seq)` with the serialized
//!   state, the encoded next-node target, and a timestamp.
//!
//! Serialization goes through the models in
//! [`persistence`](super::persistence); this module stays focused on
//! database I/O. When the `sqlite-migrations` feature is enabled (default),
//! embedded migrations run on connect; disabling it assumes the schema is
//! managed externally.

use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use std::sync::Arc;
use tracing::instrument;

use super::checkpointer::{Checkpoint, Checkpointer, CheckpointerError, Result};
use super::persistence::{PersistedCheckpoint, PersistedState};
use crate::types::NodeId;

/// Durable checkpointer over a SQLite connection pool.
pub struct SqliteCheckpointer {
    pool: Arc<SqlitePool>,
}

impl std::fmt::Debug for SqliteCheckpointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCheckpointer").finish()
    }
}

impl SqliteCheckpointer {
    /// Connect to (or create) a SQLite database.
    /// Example URL: `sqlite://threadflow.db?mode=rwc`.
    #[must_use = "checkpointer must be used to persist state"]
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(|e| CheckpointerError::Backend {
                message: format!("connect error: {e}"),
            })?;
        #[cfg(feature = "sqlite-migrations")]
        {
            if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
                return Err(CheckpointerError::Backend {
                    message: format!("migration failure: {e}"),
                });
            }
        }
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    fn row_to_checkpoint(thread_id: &str, row: &SqliteRow) -> Result<Checkpoint> {
        let seq: i64 = row.get("seq");
        let state_json: String = row.get("state_json");
        let next_node: String = row.get("next_node");
        let created_at: String = row.get("created_at");

        let state: PersistedState =
            serde_json::from_str(&state_json).map_err(|e| CheckpointerError::Serde {
                message: format!("state decode: {e}"),
            })?;
        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .map_err(|e| CheckpointerError::Serde {
                message: format!("created_at decode: {e}"),
            })?;

        Ok(Checkpoint {
            thread_id: thread_id.to_string(),
            seq: seq as u64,
            state: state.into(),
            next_node: NodeId::decode(&next_node),
            created_at,
        })
    }
}

#[async_trait::async_trait]
impl Checkpointer for SqliteCheckpointer {
    #[instrument(skip(self, checkpoint), fields(thread_id = %checkpoint.thread_id, seq = checkpoint.seq), err)]
    async fn save(&self, checkpoint: Checkpoint) -> Result<()> {
        let persisted = PersistedCheckpoint::from(&checkpoint);
        let state_json =
            serde_json::to_string(&persisted.state).map_err(|e| CheckpointerError::Serde {
                message: format!("state encode: {e}"),
            })?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CheckpointerError::Backend {
                message: format!("tx begin: {e}"),
            })?;

        // Monotonicity check inside the transaction so racing writers
        // cannot both pass it.
        let last_seq: Option<i64> = sqlx::query_scalar("SELECT last_seq FROM threads WHERE id = ?1")
            .bind(&checkpoint.thread_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| CheckpointerError::Backend {
                message: format!("seq check: {e}"),
            })?;
        if let Some(last) = last_seq {
            if checkpoint.seq as i64 <= last {
                return Err(CheckpointerError::NonMonotonic {
                    thread_id: checkpoint.thread_id,
                    attempted: checkpoint.seq,
                    last: last as u64,
                });
            }
        }

        sqlx::query(
            r#"
            INSERT INTO threads (id, last_seq, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET last_seq = ?2, updated_at = ?3
            "#,
        )
        .bind(&checkpoint.thread_id)
        .bind(checkpoint.seq as i64)
        .bind(persisted.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| CheckpointerError::Backend {
            message: format!("upsert thread: {e}"),
        })?;

        sqlx::query(
            r#"
            INSERT INTO checkpoints (thread_id, seq, state_json, next_node, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&checkpoint.thread_id)
        .bind(checkpoint.seq as i64)
        .bind(&state_json)
        .bind(&persisted.next_node)
        .bind(persisted.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| CheckpointerError::Backend {
            message: format!("insert checkpoint: {e}"),
        })?;

        tx.commit().await.map_err(|e| CheckpointerError::Backend {
            message: format!("tx commit: {e}"),
        })?;

        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn load_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let row: Option<SqliteRow> = sqlx::query(
            r#"
            SELECT seq, state_json, next_node, created_at
            FROM checkpoints
            WHERE thread_id = ?1
            ORDER BY seq DESC
            LIMIT 1
            "#,
        )
        .bind(thread_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| CheckpointerError::Backend {
            message: format!("select latest: {e}"),
        })?;

        row.map(|r| Self::row_to_checkpoint(thread_id, &r)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn load_seq(&self, thread_id: &str, seq: u64) -> Result<Option<Checkpoint>> {
        let row: Option<SqliteRow> = sqlx::query(
            r#"
            SELECT seq, state_json, next_node, created_at
            FROM checkpoints
            WHERE thread_id = ?1 AND seq = ?2
            "#,
        )
        .bind(thread_id)
        .bind(seq as i64)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| CheckpointerError::Backend {
            message: format!("select seq: {e}"),
        })?;

        row.map(|r| Self::row_to_checkpoint(thread_id, &r)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_threads(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT id FROM threads ORDER BY id ASC")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| CheckpointerError::Backend {
                message: format!("list threads: {e}"),
            })?;
        Ok(rows.into_iter().map(|r| r.get::<String, _>("id")).collect())
    }
}
