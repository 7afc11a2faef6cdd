//! Validation and compilation of a graph definition into an executable app.

use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::{instrument, warn};

use super::builder::GraphBuilder;
use super::edges::ConditionalEdges;
use super::errors::GraphDefinitionError;
use crate::app::App;
use crate::node::Node;
use crate::reducers::StateSchema;
use crate::types::NodeId;

/// The routing rule attached to one node after compilation.
///
/// Nodes with no declared route are absent from the route table; the
/// execution loop treats that as an implicit edge to the terminal sentinel.
#[derive(Clone, Debug)]
pub(crate) enum RouteRule {
    Unconditional(NodeId),
    Conditional(ConditionalEdges),
}

/// Validated, immutable graph structure backing an [`App`].
pub(crate) struct CompiledGraph {
    pub(crate) nodes: FxHashMap<String, Arc<dyn Node>>,
    pub(crate) routes: FxHashMap<String, RouteRule>,
    pub(crate) entry_point: String,
    pub(crate) schema: StateSchema,
}

impl GraphBuilder {
    /// Validates the definition and compiles it into an executable [`App`].
    ///
    /// Checks run in a fixed order and the first failure is returned:
    ///
    /// 1. Registration errors recorded by the fluent API, in call order
    ///    (duplicate names, reserved names).
    /// 2. Entry point: present and registered.
    /// 3. Reference integrity: every edge endpoint and router target names a
    ///    registered node (or the terminal sentinel).
    /// 4. Routing ambiguity: at most one routing rule per node.
    ///
    /// Nodes unreachable from the entry point are legal but logged at `warn`.
    #[instrument(skip_all, fields(nodes = self.nodes.len()))]
    pub fn compile(mut self) -> Result<App, GraphDefinitionError> {
        if !self.definition_errors.is_empty() {
            return Err(self.definition_errors.remove(0));
        }

        let entry_point = self
            .entry_point
            .clone()
            .ok_or(GraphDefinitionError::MissingEntryPoint)?;
        if !self.nodes.contains_key(&entry_point) {
            return Err(GraphDefinitionError::UnknownNode {
                name: entry_point,
                role: "entry point".to_string(),
            });
        }

        self.check_references()?;
        self.check_ambiguity()?;

        let routes = self.build_routes();
        let graph = CompiledGraph {
            entry_point,
            routes,
            schema: std::mem::take(&mut self.schema),
            nodes: std::mem::take(&mut self.nodes),
        };
        warn_unreachable(&graph);

        Ok(App::from_compiled(graph, self.runtime_config))
    }

    /// Every edge endpoint and router target must name a registered node.
    /// Iteration is sorted so the reported error is deterministic.
    fn check_references(&self) -> Result<(), GraphDefinitionError> {
        let mut sources: Vec<&String> = self.edges.keys().collect();
        sources.sort_unstable();
        for source in sources {
            if !self.nodes.contains_key(source) {
                return Err(GraphDefinitionError::UnknownNode {
                    name: source.clone(),
                    role: "edge source".to_string(),
                });
            }
            for target in &self.edges[source] {
                if let NodeId::Node(name) = target {
                    if !self.nodes.contains_key(name) {
                        return Err(GraphDefinitionError::UnknownNode {
                            name: name.clone(),
                            role: format!("edge from {source:?}"),
                        });
                    }
                }
            }
        }

        for cond in &self.conditional_edges {
            if !self.nodes.contains_key(&cond.source) {
                return Err(GraphDefinitionError::UnknownNode {
                    name: cond.source.clone(),
                    role: "conditional edge source".to_string(),
                });
            }
            for label in cond.sorted_labels() {
                if let NodeId::Node(name) = &cond.targets[label] {
                    if !self.nodes.contains_key(name) {
                        return Err(GraphDefinitionError::UnknownNode {
                            name: name.clone(),
                            role: format!("route label {label:?} on node {:?}", cond.source),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// A node may carry one unconditional edge or one conditional edge set,
    /// never several and never both.
    fn check_ambiguity(&self) -> Result<(), GraphDefinitionError> {
        let mut sources: Vec<&String> = self.edges.keys().collect();
        sources.sort_unstable();
        for source in sources {
            let outgoing = &self.edges[source];
            if outgoing.len() > 1 {
                return Err(GraphDefinitionError::AmbiguousRouting {
                    source: source.clone(),
                    detail: format!("{} unconditional edges", outgoing.len()),
                });
            }
            if self
                .conditional_edges
                .iter()
                .any(|cond| &cond.source == source)
            {
                return Err(GraphDefinitionError::AmbiguousRouting {
                    source: source.clone(),
                    detail: "both an unconditional edge and a conditional edge set".to_string(),
                });
            }
        }

        for (idx, cond) in self.conditional_edges.iter().enumerate() {
            let repeats = self.conditional_edges[idx + 1..]
                .iter()
                .any(|other| other.source == cond.source);
            if repeats {
                return Err(GraphDefinitionError::AmbiguousRouting {
                    source: cond.source.clone(),
                    detail: "multiple conditional edge sets".to_string(),
                });
            }
        }

        Ok(())
    }

    fn build_routes(&mut self) -> FxHashMap<String, RouteRule> {
        let mut routes: FxHashMap<String, RouteRule> = FxHashMap::default();
        for (source, targets) in self.edges.drain() {
            // Exactly one target per source after the ambiguity check.
            if let Some(target) = targets.into_iter().next() {
                routes.insert(source, RouteRule::Unconditional(target));
            }
        }
        for cond in self.conditional_edges.drain(..) {
            routes.insert(cond.source.clone(), RouteRule::Conditional(cond));
        }
        routes
    }
}

/// Walks the route table from the entry point and logs registered nodes the
/// walk never reaches.
fn warn_unreachable(graph: &CompiledGraph) {
    let mut reached: Vec<&str> = vec![graph.entry_point.as_str()];
    let mut frontier = vec![graph.entry_point.as_str()];
    while let Some(current) = frontier.pop() {
        let Some(rule) = graph.routes.get(current) else {
            continue;
        };
        let targets: Vec<&NodeId> = match rule {
            RouteRule::Unconditional(target) => vec![target],
            RouteRule::Conditional(cond) => cond.targets.values().collect(),
        };
        for target in targets {
            if let NodeId::Node(name) = target {
                if !reached.contains(&name.as_str()) {
                    reached.push(name.as_str());
                    frontier.push(name.as_str());
                }
            }
        }
    }

    let mut unreachable: Vec<&str> = graph
        .nodes
        .keys()
        .map(String::as_str)
        .filter(|name| !reached.contains(name))
        .collect();
    if !unreachable.is_empty() {
        unreachable.sort_unstable();
        warn!(nodes = ?unreachable, "nodes unreachable from entry point");
    }
}
