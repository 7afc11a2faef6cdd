//! Compiled application: the executable form of a workflow graph.

use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::instrument;

use crate::graph::compilation::CompiledGraph;
use crate::runtime::checkpointer::{Checkpointer, CheckpointerError, InMemoryCheckpointer};
use crate::runtime::runner::{Runner, ThreadLeases};
use crate::runtime::runtime_config::{CheckpointerType, RuntimeConfig};
use crate::runtime::{InvokeError, InvokeOptions, InvokeReport};
use crate::state::GraphState;

/// An immutable, validated workflow graph ready to invoke.
///
/// Produced by [`GraphBuilder::compile`](crate::graph::GraphBuilder::compile).
/// Cloning an `App` is cheap and clones share the checkpoint store and the
/// per-thread leases, so two clones invoking the same thread id serialize
/// against each other and see each other's checkpoints.
///
/// # Invocation forms
///
/// - [`invoke`](Self::invoke): ephemeral run, no thread id, no store.
/// - [`invoke_with_options`](Self::invoke_with_options): thread id, step
///   limit, deadline, cancellation.
/// - [`invoke_with_report`](Self::invoke_with_report): same, returning the
///   full [`InvokeReport`] instead of just the final state.
#[derive(Clone)]
pub struct App {
    graph: Arc<CompiledGraph>,
    runtime_config: RuntimeConfig,
    /// Lazily provisioned on the first invocation carrying a thread id.
    checkpointer_cell: Arc<OnceCell<Arc<dyn Checkpointer>>>,
    leases: Arc<ThreadLeases>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("entry_point", &self.graph.entry_point)
            .field("nodes", &self.node_names())
            .finish_non_exhaustive()
    }
}

impl App {
    pub(crate) fn from_compiled(graph: CompiledGraph, runtime_config: RuntimeConfig) -> Self {
        Self {
            graph: Arc::new(graph),
            runtime_config,
            checkpointer_cell: Arc::new(OnceCell::new()),
            leases: Arc::new(ThreadLeases::default()),
        }
    }

    /// Name of the node where fresh invocations begin.
    #[must_use]
    pub fn entry_point(&self) -> &str {
        &self.graph.entry_point
    }

    /// Registered node names, sorted.
    #[must_use]
    pub fn node_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.graph.nodes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn has_node(&self, name: &str) -> bool {
        self.graph.nodes.contains_key(name)
    }

    #[must_use]
    pub fn runtime_config(&self) -> &RuntimeConfig {
        &self.runtime_config
    }

    /// Installs a specific checkpoint store instead of the lazily
    /// provisioned default. The first installed store wins; later calls on
    /// this app (or a clone that already invoked with a thread id) are
    /// no-ops.
    #[must_use]
    pub fn with_checkpointer(self, store: Arc<dyn Checkpointer>) -> Self {
        let _ = self.checkpointer_cell.set(store);
        self
    }

    /// Runs the graph once, ephemerally: no thread id, no checkpoint store
    /// touched, default step limit.
    pub async fn invoke(&self, initial: GraphState) -> Result<GraphState, InvokeError> {
        self.invoke_with_options(initial, InvokeOptions::default())
            .await
    }

    /// Runs the graph with explicit options and returns the final state.
    pub async fn invoke_with_options(
        &self,
        initial: GraphState,
        options: InvokeOptions,
    ) -> Result<GraphState, InvokeError> {
        Ok(self.invoke_with_report(initial, options).await?.state)
    }

    /// Runs the graph with explicit options and returns the full report.
    ///
    /// When `options.thread_id` is set, the invocation acquires that
    /// thread's lease for its whole duration (concurrent invocations on the
    /// same thread id serialize) and resumes from the latest checkpoint if
    /// one exists, ignoring `initial`.
    #[instrument(skip_all, fields(thread_id = ?options.thread_id))]
    pub async fn invoke_with_report(
        &self,
        initial: GraphState,
        options: InvokeOptions,
    ) -> Result<InvokeReport, InvokeError> {
        let (checkpointer, _lease) = match &options.thread_id {
            Some(thread_id) => {
                let store = self.checkpointer().await?;
                let lease = self.leases.acquire(thread_id).await;
                (Some(store), Some(lease))
            }
            None => (None, None),
        };

        let max_steps = options
            .max_steps
            .unwrap_or(self.runtime_config.default_max_steps);
        let runner = Runner {
            graph: Arc::clone(&self.graph),
            checkpointer,
            options,
            max_steps,
        };
        runner.run(initial).await
    }

    async fn checkpointer(&self) -> Result<Arc<dyn Checkpointer>, InvokeError> {
        self.checkpointer_cell
            .get_or_try_init(|| async {
                match self.runtime_config.checkpointer {
                    CheckpointerType::InMemory => {
                        Ok::<_, CheckpointerError>(
                            Arc::new(InMemoryCheckpointer::new()) as Arc<dyn Checkpointer>
                        )
                    }
                    #[cfg(feature = "sqlite")]
                    CheckpointerType::Sqlite => {
                        let url = self.runtime_config.resolve_database_url();
                        let store =
                            crate::runtime::checkpointer_sqlite::SqliteCheckpointer::connect(&url)
                                .await?;
                        Ok(Arc::new(store) as Arc<dyn Checkpointer>)
                    }
                }
            })
            .await
            .cloned()
            .map_err(InvokeError::Checkpointer)
    }
}
