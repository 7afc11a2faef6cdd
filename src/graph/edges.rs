//! Edge types for graph construction and routing.

use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

use crate::state::StateSnapshot;
use crate::types::NodeId;

/// Routing function for a conditional edge set.
///
/// Evaluated after the source node's update has been merged, against a
/// snapshot of the *post-merge* state. Returns a label that must match one of
/// the edge set's declared targets; an unmatched label fails the invocation.
pub type Router = Arc<dyn Fn(&StateSnapshot) -> String + Send + Sync>;

/// A conditional edge set: one source node, one router, a label→target map.
///
/// A source node may carry at most one edge set, and a node with an edge set
/// may not also have an unconditional edge. Both violations surface as
/// ambiguous-routing errors at compile time.
#[derive(Clone)]
pub struct ConditionalEdges {
    /// Source node name.
    pub source: String,
    /// Router evaluated against post-merge state.
    pub router: Router,
    /// Label to routing target.
    pub targets: FxHashMap<String, NodeId>,
}

impl ConditionalEdges {
    /// Declared labels in sorted order, for diagnostics.
    #[must_use]
    pub fn sorted_labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.targets.keys().map(String::as_str).collect();
        labels.sort_unstable();
        labels
    }
}

impl fmt::Debug for ConditionalEdges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionalEdges")
            .field("source", &self.source)
            .field("labels", &self.sorted_labels())
            .finish_non_exhaustive()
    }
}
