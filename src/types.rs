//! Core identity types for the threadflow workflow engine.
//!
//! This module defines [`NodeId`], the identifier used for routing targets
//! throughout the graph, plus the two reserved sentinel names. These are the
//! fundamental domain concepts; runtime execution types (thread ids, step
//! sequences) live in [`crate::runtime`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved name for the virtual entry sentinel. Never a real node.
pub const START: &str = "START";

/// Reserved name for the virtual terminal sentinel. Never a real node.
pub const END: &str = "END";

/// A routing target inside a compiled graph.
///
/// `NodeId` is either a named, registered node or the terminal sentinel.
/// There is deliberately no `Start` variant: the entry point is designated by
/// name on the builder and nothing is ever routed *to* the start sentinel.
///
/// # Persistence
///
/// `NodeId` supports serialization for checkpointing through both serde and
/// the [`encode`](Self::encode)/[`decode`](Self::decode) string forms.
///
/// # Examples
///
/// ```rust
/// use threadflow::types::NodeId;
///
/// let classify = NodeId::node("classify");
/// assert_eq!(classify.encode(), "Node:classify");
/// assert_eq!(NodeId::decode("End"), NodeId::End);
/// assert_eq!(NodeId::decode(&classify.encode()), classify);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeId {
    /// A registered node, identified by its unique, case-sensitive name.
    Node(String),

    /// Terminal sentinel: reaching it completes the invocation.
    End,
}

impl NodeId {
    /// Convenience constructor for a named node target.
    pub fn node(name: impl Into<String>) -> Self {
        NodeId::Node(name.into())
    }

    /// Encode a NodeId into its persisted string form.
    ///
    /// - `End` → `"End"`
    /// - `Node("X")` → `"Node:X"`
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            NodeId::End => "End".to_string(),
            NodeId::Node(s) => format!("Node:{s}"),
        }
    }

    /// Decode a persisted string form back into a NodeId.
    ///
    /// Unrecognized formats fall back to `Node(s)` so older encodings keep
    /// round-tripping.
    pub fn decode(s: &str) -> Self {
        if s == "End" {
            NodeId::End
        } else if let Some(rest) = s.strip_prefix("Node:") {
            NodeId::Node(rest.to_string())
        } else {
            NodeId::Node(s.to_string())
        }
    }

    /// Returns `true` if this is the terminal sentinel.
    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }

    /// The node name, or `None` for the terminal sentinel.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            NodeId::Node(name) => Some(name),
            NodeId::End => None,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(name) => write!(f, "{name}"),
            Self::End => write!(f, "{END}"),
        }
    }
}

// Developer experience: allow string literals where a routing target is
// expected. The literal "END" maps to the terminal sentinel; everything else
// is a named node (validated against the registry at compile time).
impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        if s == END {
            NodeId::End
        } else {
            NodeId::Node(s.to_string())
        }
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId::from(s.as_str())
    }
}

/// Returns `true` for the two reserved sentinel names.
///
/// Reserved names are case-sensitive: `"start"` and `"end"` are ordinary
/// node names.
#[must_use]
pub fn is_reserved_name(name: &str) -> bool {
    name == START || name == END
}
