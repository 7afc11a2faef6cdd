//! Node execution contract for the threadflow engine.
//!
//! This module provides the [`Node`] trait implemented by every unit of work
//! in a graph, the [`NodeContext`] handed to it at invocation time, the
//! [`NodePartial`] update it returns, and the fatal [`NodeError`] type.

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::state::StateSnapshot;

/// A named unit of work in the workflow graph.
///
/// Nodes receive a read-only snapshot of the current state plus a run-scoped
/// context, do their work, and return a partial state update containing only
/// the fields they intend to change. The engine merges that partial into the
/// run's state according to each field's declared merge policy.
///
/// # Contract
///
/// - A node never mutates state directly; it only proposes fields via the
///   returned [`NodePartial`].
/// - Every field it returns must have a merge policy declared on the graph's
///   [`StateSchema`](crate::reducers::StateSchema); undeclared fields fail
///   the invocation with a merge error.
/// - Returning an empty partial is legal and merges nothing.
/// - A node is never invoked concurrently with itself within one invocation
///   (the loop is strictly sequential), but may run concurrently across
///   distinct invocations, so implementations must be `Send + Sync`.
/// - The engine checkpoints each merged step before advancing but does not
///   deduplicate external side effects on resume after a crash mid-step;
///   handlers needing stronger guarantees must be idempotent themselves.
///
/// # Examples
///
/// ```rust
/// use threadflow::node::{Node, NodeContext, NodeError, NodePartial};
/// use threadflow::state::StateSnapshot;
/// use async_trait::async_trait;
/// use serde_json::json;
///
/// struct Greeting;
///
/// #[async_trait]
/// impl Node for Greeting {
///     async fn run(
///         &self,
///         _snapshot: StateSnapshot,
///         _ctx: NodeContext,
///     ) -> Result<NodePartial, NodeError> {
///         Ok(NodePartial::new().with_field("response", json!("Hello! Nice to see you!")))
///     }
/// }
/// ```
#[async_trait]
pub trait Node: Send + Sync {
    /// Execute this node against the given state snapshot.
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError>;
}

/// Run-scoped context passed to a node handler.
///
/// Carries the node's own identity, the step sequence it is producing, the
/// thread id when checkpointing is enabled, and the invocation's
/// cancellation token.
#[derive(Clone, Debug)]
pub struct NodeContext {
    /// Name of the node being executed.
    pub node: String,
    /// Step sequence this execution will produce (1-based per thread).
    pub step: u64,
    /// Thread id of the invocation, when one was supplied.
    pub thread_id: Option<String>,
    /// Cancellation signal for the invocation. The loop only enforces it at
    /// step boundaries; long-running handlers may poll it voluntarily.
    pub cancellation: CancellationToken,
}

impl NodeContext {
    /// Whether the invocation has been cancelled.
    ///
    /// Convenience for handlers that want to abandon expensive work early.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Partial state update returned by a node.
///
/// Maps field name to proposed new value. The engine folds each entry into
/// the run state using the field's declared merge policy; fields the node
/// does not mention are untouched. An empty partial is a no-op merge.
///
/// # Examples
///
/// ```rust
/// use threadflow::node::NodePartial;
/// use serde_json::json;
///
/// let partial = NodePartial::new()
///     .with_field("classification", json!("greeting"))
///     .with_field("responses", json!(["Hello!"]));
/// assert_eq!(partial.len(), 2);
/// ```
#[derive(Clone, Debug, Default)]
pub struct NodePartial {
    updates: FxHashMap<String, Value>,
}

impl NodePartial {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) one proposed field update.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>, value: Value) -> Self {
        self.updates.insert(field.into(), value);
        self
    }

    /// Imperative variant of [`with_field`](Self::with_field).
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.updates.insert(field.into(), value);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.updates.get(field)
    }

    /// Proposed updates ordered by field name.
    ///
    /// Merge application iterates this ordering so results are deterministic
    /// regardless of hash-map layout.
    #[must_use]
    pub fn sorted_entries(&self) -> Vec<(&str, &Value)> {
        let mut entries: Vec<(&str, &Value)> = self
            .updates
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        entries.sort_unstable_by_key(|(k, _)| *k);
        entries
    }
}

impl FromIterator<(String, Value)> for NodePartial {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            updates: iter.into_iter().collect(),
        }
    }
}

/// Fatal errors raised by node handlers.
///
/// Any `NodeError` terminates the invocation; the loop wraps it in
/// [`InvokeError::NodeExecution`](crate::runtime::InvokeError::NodeExecution)
/// together with the failing node and step. The engine never retries.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    /// Expected input data is missing from the state snapshot.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(threadflow::node::missing_input),
        help("Check that an upstream node produced the required field.")
    )]
    MissingInput { what: &'static str },

    /// Free-form handler failure.
    #[error("{0}")]
    #[diagnostic(code(threadflow::node::other))]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorted_entries_are_ordered_by_field() {
        let partial = NodePartial::new()
            .with_field("zeta", json!(1))
            .with_field("alpha", json!(2));
        let keys: Vec<&str> = partial.sorted_entries().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["alpha", "zeta"]);
    }

    #[test]
    fn empty_partial_is_empty() {
        assert!(NodePartial::new().is_empty());
    }
}
