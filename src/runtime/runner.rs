//! The sequential execution loop.
//!
//! One invocation is a strict loop: execute the current node, merge its
//! partial update, resolve the route against the post-merge state, persist a
//! checkpoint when a thread id is present, then advance. Cancellation,
//! deadline, and the step limit are enforced at step boundaries only; an
//! in-flight handler is never interrupted, so the last checkpoint always
//! reflects a fully completed step.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::checkpointer::{Checkpoint, Checkpointer, CheckpointerError};
use crate::graph::compilation::{CompiledGraph, RouteRule};
use crate::node::{NodeContext, NodeError};
use crate::reducers::StateMergeError;
use crate::state::GraphState;
use crate::types::NodeId;

/// Errors that terminate an invocation.
///
/// All variants are terminal; the engine never retries. When checkpointing
/// is active, the thread's last persisted checkpoint remains valid and a
/// later invocation with the same thread id resumes from it.
#[derive(Debug, Error, Diagnostic)]
pub enum InvokeError {
    /// A node's partial update failed to merge. No checkpoint was written
    /// for the failing step.
    #[error("merge failed at node {node:?} (step {step})")]
    #[diagnostic(code(threadflow::invoke::state_merge))]
    StateMerge {
        node: String,
        step: u64,
        #[source]
        #[diagnostic_source]
        source: StateMergeError,
    },

    /// A conditional router returned a label with no declared target. No
    /// checkpoint was written for the failing step.
    #[error("router on node {node:?} returned unknown label {label:?} (step {step})")]
    #[diagnostic(
        code(threadflow::invoke::unknown_route_label),
        help("The router must return one of the labels declared on the edge set.")
    )]
    UnknownRouteLabel {
        node: String,
        label: String,
        step: u64,
        /// Declared labels, sorted.
        expected: Vec<String>,
    },

    /// The invocation executed its step limit without reaching the terminal
    /// sentinel. The usual cause is an unbroken cycle.
    #[error("step limit of {limit} exceeded without termination")]
    #[diagnostic(
        code(threadflow::invoke::step_limit),
        help("Raise max_steps or check the graph's routers for a cycle that never exits.")
    )]
    StepLimitExceeded { limit: u64 },

    /// A node handler returned a fatal error.
    #[error("node {node:?} failed (step {step})")]
    #[diagnostic(code(threadflow::invoke::node_execution))]
    NodeExecution {
        node: String,
        step: u64,
        #[source]
        #[diagnostic_source]
        source: NodeError,
    },

    /// The checkpoint store failed, or refused a non-monotonic save.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Checkpointer(#[from] CheckpointerError),

    /// The caller's cancellation token fired. `step` is the last completed
    /// and (when checkpointing) persisted step.
    #[error("invocation cancelled after step {step}")]
    #[diagnostic(code(threadflow::invoke::cancelled))]
    Cancelled { step: u64 },

    /// The invocation deadline passed. `step` is the last completed step.
    #[error("deadline exceeded after step {step}")]
    #[diagnostic(code(threadflow::invoke::deadline))]
    DeadlineExceeded { step: u64 },

    /// A resumed thread's checkpoint points at a node the current graph does
    /// not register, typically after the graph definition changed between
    /// runs.
    #[error("thread {thread_id:?} resumes at unknown node {node:?}")]
    #[diagnostic(
        code(threadflow::invoke::unknown_resume_target),
        help("The graph no longer registers the node this thread was checkpointed at.")
    )]
    UnknownResumeTarget { thread_id: String, node: String },
}

/// Per-invocation options.
///
/// # Examples
///
/// ```rust
/// use threadflow::runtime::InvokeOptions;
///
/// let options = InvokeOptions::new()
///     .with_thread_id("user_123")
///     .with_max_steps(10);
/// assert_eq!(options.thread_id.as_deref(), Some("user_123"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct InvokeOptions {
    /// Durable thread identity. Present: checkpointing and resume are
    /// active. Absent: the run is ephemeral and no store is touched.
    pub thread_id: Option<String>,
    /// Step limit override for this invocation.
    pub max_steps: Option<u64>,
    /// Absolute deadline, checked at step boundaries.
    pub deadline: Option<tokio::time::Instant>,
    /// Cancellation token, checked at step boundaries. Callers keep a clone
    /// to request cancellation from outside.
    pub cancellation: CancellationToken,
}

impl InvokeOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    #[must_use]
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: tokio::time::Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

/// How a thread-scoped invocation started.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ThreadInit {
    /// No checkpoint existed; the run started from the caller's initial
    /// state at the entry point.
    Fresh,
    /// A checkpoint existed; the run continued from it and the caller's
    /// initial state was ignored.
    Resumed {
        /// Sequence of the checkpoint the run continued from.
        seq: u64,
    },
}

/// Outcome of a completed invocation.
#[derive(Clone, Debug)]
pub struct InvokeReport {
    /// Final state after the terminal sentinel was reached.
    pub state: GraphState,
    /// Steps executed by this invocation (not the thread's total).
    pub steps_taken: u64,
    /// Thread identity, when one was supplied.
    pub thread_id: Option<String>,
    /// Fresh or resumed, when a thread id was supplied.
    pub thread_init: Option<ThreadInit>,
    /// Node names in execution order for this invocation.
    pub visited: Vec<String>,
}

/// Per-thread mutual exclusion.
///
/// Concurrent invocations with the same thread id are serialized, never run
/// interleaved: the second caller waits for the first to finish, then
/// resumes from the checkpoints the first wrote. Distinct thread ids do not
/// contend.
#[derive(Debug, Default)]
pub(crate) struct ThreadLeases {
    locks: Mutex<FxHashMap<String, Arc<Mutex<()>>>>,
}

impl ThreadLeases {
    /// Acquire the lease for a thread id, waiting for any current holder.
    /// The guard is held for the whole invocation.
    pub(crate) async fn acquire(&self, thread_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(thread_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// One invocation's execution context.
pub(crate) struct Runner {
    pub(crate) graph: Arc<CompiledGraph>,
    pub(crate) checkpointer: Option<Arc<dyn Checkpointer>>,
    pub(crate) options: InvokeOptions,
    pub(crate) max_steps: u64,
}

impl Runner {
    /// Drives the loop to the terminal sentinel or the first terminal error.
    #[instrument(skip_all, fields(thread_id = ?self.options.thread_id))]
    pub(crate) async fn run(self, initial: GraphState) -> Result<InvokeReport, InvokeError> {
        let run_id = crate::utils::id_generator::new_run_id();
        debug!(run_id = %run_id, "invocation starting");
        let (mut state, mut seq, mut current, thread_init) = self.bootstrap(initial).await?;

        let mut visited: Vec<String> = Vec::new();
        let mut steps_taken: u64 = 0;

        while let NodeId::Node(name) = current {
            if self.options.cancellation.is_cancelled() {
                return Err(InvokeError::Cancelled { step: seq });
            }
            if let Some(deadline) = self.options.deadline {
                if tokio::time::Instant::now() >= deadline {
                    return Err(InvokeError::DeadlineExceeded { step: seq });
                }
            }
            if steps_taken >= self.max_steps {
                return Err(InvokeError::StepLimitExceeded {
                    limit: self.max_steps,
                });
            }

            let node = self.graph.nodes.get(&name).ok_or_else(|| {
                // Only reachable via resume: compile guarantees every routed
                // target is registered in the compiling graph.
                InvokeError::UnknownResumeTarget {
                    thread_id: self.options.thread_id.clone().unwrap_or_default(),
                    node: name.clone(),
                }
            })?;

            let step = seq + 1;
            debug!(node = %name, step, "executing node");
            let ctx = NodeContext {
                node: name.clone(),
                step,
                thread_id: self.options.thread_id.clone(),
                cancellation: self.options.cancellation.clone(),
            };
            let partial = node.run(state.snapshot(), ctx).await.map_err(|source| {
                InvokeError::NodeExecution {
                    node: name.clone(),
                    step,
                    source,
                }
            })?;

            self.graph
                .schema
                .apply(&mut state, &partial)
                .map_err(|source| InvokeError::StateMerge {
                    node: name.clone(),
                    step,
                    source,
                })?;

            let next = self.resolve_route(&name, &state, step)?;

            seq = step;
            if let (Some(store), Some(thread_id)) =
                (&self.checkpointer, &self.options.thread_id)
            {
                store
                    .save(Checkpoint {
                        thread_id: thread_id.clone(),
                        seq,
                        state: state.clone(),
                        next_node: next.clone(),
                        created_at: chrono::Utc::now(),
                    })
                    .await?;
            }

            visited.push(name);
            steps_taken += 1;
            current = next;
        }

        debug!(steps_taken, "invocation complete");
        Ok(InvokeReport {
            state,
            steps_taken,
            thread_id: self.options.thread_id.clone(),
            thread_init: self.options.thread_id.as_ref().map(|_| thread_init),
            visited,
        })
    }

    /// Determines initial state, sequence, and position.
    ///
    /// With a thread id and an existing checkpoint, the run continues from
    /// the checkpoint and the caller's initial state is discarded. Otherwise
    /// the run is fresh from the entry point; the first checkpoint (if any)
    /// is written after the first merge.
    async fn bootstrap(
        &self,
        initial: GraphState,
    ) -> Result<(GraphState, u64, NodeId, ThreadInit), InvokeError> {
        if let (Some(store), Some(thread_id)) = (&self.checkpointer, &self.options.thread_id) {
            if let Some(checkpoint) = store.load_latest(thread_id).await? {
                debug!(
                    thread_id = %thread_id,
                    seq = checkpoint.seq,
                    next_node = %checkpoint.next_node,
                    "resuming from checkpoint"
                );
                return Ok((
                    checkpoint.state,
                    checkpoint.seq,
                    checkpoint.next_node,
                    ThreadInit::Resumed {
                        seq: checkpoint.seq,
                    },
                ));
            }
        }
        Ok((
            initial,
            0,
            NodeId::node(self.graph.entry_point.clone()),
            ThreadInit::Fresh,
        ))
    }

    /// Resolves the node's routing rule against post-merge state. A node
    /// with no rule routes to the terminal sentinel.
    fn resolve_route(
        &self,
        node: &str,
        state: &GraphState,
        step: u64,
    ) -> Result<NodeId, InvokeError> {
        match self.graph.routes.get(node) {
            None => Ok(NodeId::End),
            Some(RouteRule::Unconditional(target)) => Ok(target.clone()),
            Some(RouteRule::Conditional(cond)) => {
                let label = (cond.router)(&state.snapshot());
                match cond.targets.get(&label) {
                    Some(target) => {
                        debug!(node, label = %label, target = %target, "conditional route");
                        Ok(target.clone())
                    }
                    None => Err(InvokeError::UnknownRouteLabel {
                        node: node.to_string(),
                        label,
                        step,
                        expected: cond
                            .sorted_labels()
                            .into_iter()
                            .map(String::from)
                            .collect(),
                    }),
                }
            }
        }
    }
}
