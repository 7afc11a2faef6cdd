//! Checkpoint store contract and the in-memory reference implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::instrument;

use crate::state::GraphState;
use crate::types::NodeId;

pub type Result<T> = std::result::Result<T, CheckpointerError>;

/// One durable record of a thread's progress.
///
/// A checkpoint is written after a node's update has merged and its route has
/// resolved, and before the loop advances. `next_node` is therefore the node
/// a resumed invocation executes first; a checkpoint whose `next_node` is the
/// terminal sentinel records a completed run.
#[derive(Clone, Debug)]
pub struct Checkpoint {
    /// Durable identity of the logical conversation or job.
    pub thread_id: String,
    /// Step sequence, 1-based and strictly increasing per thread.
    pub seq: u64,
    /// Full state after the step's merge.
    pub state: GraphState,
    /// Where execution goes next.
    pub next_node: NodeId,
    /// Wall-clock write time.
    pub created_at: DateTime<Utc>,
}

/// Errors from checkpoint storage backends.
#[derive(Debug, Error, Diagnostic)]
pub enum CheckpointerError {
    /// A save attempted to move a thread's sequence backwards or sideways.
    #[error(
        "non-monotonic checkpoint for thread {thread_id:?}: attempted seq {attempted}, last {last}"
    )]
    #[diagnostic(
        code(threadflow::checkpointer::non_monotonic),
        help("Checkpoint sequences must be strictly increasing; a second writer is likely racing this thread.")
    )]
    NonMonotonic {
        thread_id: String,
        attempted: u64,
        last: u64,
    },

    /// Storage backend failure (connection, query, transaction).
    #[error("checkpoint backend error: {message}")]
    #[diagnostic(code(threadflow::checkpointer::backend))]
    Backend { message: String },

    /// Serialization failure while encoding or decoding a checkpoint.
    #[error("checkpoint serialization error: {message}")]
    #[diagnostic(code(threadflow::checkpointer::serde))]
    Serde { message: String },
}

/// Durable storage for per-thread checkpoints.
///
/// # Contract
///
/// - `save` must reject a checkpoint whose `seq` is not strictly greater
///   than the thread's last saved `seq` with
///   [`CheckpointerError::NonMonotonic`].
/// - `load_latest` returns the highest-`seq` checkpoint for the thread, or
///   `None` for an unknown thread.
/// - History is retained: the engine never deletes checkpoints, and no
///   deletion method exists on this trait. Retention is an operational
///   concern outside the engine.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Persist one checkpoint.
    async fn save(&self, checkpoint: Checkpoint) -> Result<()>;

    /// Latest checkpoint for a thread, if the thread is known.
    async fn load_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>>;

    /// A specific historical checkpoint for a thread.
    async fn load_seq(&self, thread_id: &str, seq: u64) -> Result<Option<Checkpoint>>;

    /// All known thread ids, sorted.
    async fn list_threads(&self) -> Result<Vec<String>>;
}

/// Process-local checkpoint store.
///
/// Keeps the full per-thread history in memory, so resume works across
/// invocations within one process but not across restarts. The default
/// backend when a thread id is supplied and nothing else is configured.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointer {
    threads: RwLock<FxHashMap<String, Vec<Checkpoint>>>,
}

impl InMemoryCheckpointer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    #[instrument(skip(self, checkpoint), fields(thread_id = %checkpoint.thread_id, seq = checkpoint.seq))]
    async fn save(&self, checkpoint: Checkpoint) -> Result<()> {
        let mut threads = self.threads.write().await;
        let history = threads.entry(checkpoint.thread_id.clone()).or_default();
        if let Some(last) = history.last() {
            if checkpoint.seq <= last.seq {
                return Err(CheckpointerError::NonMonotonic {
                    thread_id: checkpoint.thread_id,
                    attempted: checkpoint.seq,
                    last: last.seq,
                });
            }
        }
        history.push(checkpoint);
        Ok(())
    }

    async fn load_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let threads = self.threads.read().await;
        Ok(threads
            .get(thread_id)
            .and_then(|history| history.last())
            .cloned())
    }

    async fn load_seq(&self, thread_id: &str, seq: u64) -> Result<Option<Checkpoint>> {
        let threads = self.threads.read().await;
        Ok(threads
            .get(thread_id)
            .and_then(|history| history.iter().find(|cp| cp.seq == seq))
            .cloned())
    }

    async fn list_threads(&self) -> Result<Vec<String>> {
        let threads = self.threads.read().await;
        let mut ids: Vec<String> = threads.keys().cloned().collect();
        ids.sort_unstable();
        Ok(ids)
    }
}
