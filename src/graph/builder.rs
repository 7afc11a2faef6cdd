//! Fluent construction of workflow graph definitions.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use super::edges::{ConditionalEdges, Router};
use super::errors::GraphDefinitionError;
use crate::node::Node;
use crate::reducers::StateSchema;
use crate::runtime::RuntimeConfig;
use crate::state::StateSnapshot;
use crate::types::{NodeId, is_reserved_name};

/// Builder for workflow graph definitions.
///
/// Nodes, edges, the entry point, and the state schema are declared through
/// the fluent API; [`compile`](Self::compile) validates the whole definition
/// and produces an executable [`App`](crate::app::App). Registration mistakes
/// (duplicate or reserved names) do not abort the fluent chain; they are
/// recorded and reported by `compile()`.
///
/// # Examples
///
/// ```rust
/// use threadflow::graph::GraphBuilder;
/// use threadflow::node::{Node, NodeContext, NodeError, NodePartial};
/// use threadflow::reducers::StateSchema;
/// use threadflow::state::StateSnapshot;
/// use async_trait::async_trait;
/// use serde_json::json;
///
/// struct Classify;
///
/// #[async_trait]
/// impl Node for Classify {
///     async fn run(&self, snap: StateSnapshot, _: NodeContext) -> Result<NodePartial, NodeError> {
///         let label = if snap.get_str("user_input").is_some_and(|s| s.ends_with('?')) {
///             "question"
///         } else {
///             "greeting"
///         };
///         Ok(NodePartial::new().with_field("classification", json!(label)))
///     }
/// }
///
/// let app = GraphBuilder::new()
///     .with_state_schema(StateSchema::builder().overwrite("classification").build())
///     .add_node("classify", Classify)
///     .set_entry_point("classify")
///     .set_finish_point("classify")
///     .compile()
///     .expect("valid graph");
/// assert_eq!(app.entry_point(), "classify");
/// ```
pub struct GraphBuilder {
    pub(super) nodes: FxHashMap<String, Arc<dyn Node>>,
    pub(super) edges: FxHashMap<String, Vec<NodeId>>,
    pub(super) conditional_edges: Vec<ConditionalEdges>,
    pub(super) entry_point: Option<String>,
    pub(super) schema: StateSchema,
    pub(super) runtime_config: RuntimeConfig,
    /// Registration errors, surfaced by `compile()` in call order.
    pub(super) definition_errors: Vec<GraphDefinitionError>,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: FxHashMap::default(),
            edges: FxHashMap::default(),
            conditional_edges: Vec::new(),
            entry_point: None,
            schema: StateSchema::default(),
            runtime_config: RuntimeConfig::default(),
            definition_errors: Vec::new(),
        }
    }

    /// Registers a node under a unique, case-sensitive name.
    ///
    /// Registering a duplicate or reserved name records a definition error
    /// that `compile()` reports; the offending registration is ignored so the
    /// first node registered under a name stays in place.
    #[must_use]
    pub fn add_node(mut self, name: impl Into<String>, node: impl Node + 'static) -> Self {
        let name = name.into();
        if is_reserved_name(&name) {
            self.definition_errors
                .push(GraphDefinitionError::ReservedName { name });
        } else if self.nodes.contains_key(&name) {
            self.definition_errors
                .push(GraphDefinitionError::DuplicateNode { name });
        } else {
            self.nodes.insert(name, Arc::new(node));
        }
        self
    }

    /// Adds an unconditional edge from one node to a target.
    ///
    /// The target may be another node's name or the literal `"END"`. A node
    /// may have at most one unconditional edge; extras are reported as
    /// ambiguous routing at compile time.
    #[must_use]
    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<NodeId>) -> Self {
        self.edges.entry(from.into()).or_default().push(to.into());
        self
    }

    /// Adds a conditional edge set on a source node.
    ///
    /// After `source`'s update has merged, `router` is evaluated against the
    /// post-merge state and must return one of the declared labels; the run
    /// then advances to that label's target. A source may carry only one edge
    /// set and may not also have an unconditional edge.
    #[must_use]
    pub fn add_conditional_edges<L, T>(
        mut self,
        source: impl Into<String>,
        router: impl Fn(&StateSnapshot) -> String + Send + Sync + 'static,
        targets: impl IntoIterator<Item = (L, T)>,
    ) -> Self
    where
        L: Into<String>,
        T: Into<NodeId>,
    {
        let targets: FxHashMap<String, NodeId> = targets
            .into_iter()
            .map(|(label, target)| (label.into(), target.into()))
            .collect();
        self.conditional_edges.push(ConditionalEdges {
            source: source.into(),
            router: Arc::new(router) as Router,
            targets,
        });
        self
    }

    /// Designates the node where every fresh invocation begins.
    ///
    /// Exactly one entry point is required; later calls replace earlier ones.
    #[must_use]
    pub fn set_entry_point(mut self, name: impl Into<String>) -> Self {
        self.entry_point = Some(name.into());
        self
    }

    /// Shorthand for an unconditional edge from `name` to the terminal
    /// sentinel.
    #[must_use]
    pub fn set_finish_point(self, name: impl Into<String>) -> Self {
        self.add_edge(name, NodeId::End)
    }

    /// Declares the merge policies for the graph's state fields.
    ///
    /// Any field a node writes without a declared policy fails the merge at
    /// runtime, so declare everything the nodes produce.
    #[must_use]
    pub fn with_state_schema(mut self, schema: StateSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Configures runtime behavior (checkpointing, step limits) for the
    /// compiled application.
    #[must_use]
    pub fn with_runtime_config(mut self, runtime_config: RuntimeConfig) -> Self {
        self.runtime_config = runtime_config;
        self
    }
}
