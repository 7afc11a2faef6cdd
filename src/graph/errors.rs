//! Structural errors reported when compiling a graph definition.

use miette::Diagnostic;
use thiserror::Error;

/// Reasons a graph definition fails to compile.
///
/// Registration mistakes (duplicate or reserved names) are recorded as the
/// builder is used and surfaced by `compile()` in call order, before the
/// structural checks run. Structural checks then run in a fixed order:
/// entry point, reference integrity, routing ambiguity. `compile()` reports
/// the first failure it finds.
#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum GraphDefinitionError {
    /// Two nodes were registered under the same name.
    #[error("node name {name:?} registered more than once")]
    #[diagnostic(
        code(threadflow::graph::duplicate_node),
        help("Node names must be unique within a graph.")
    )]
    DuplicateNode { name: String },

    /// A node was registered under a reserved sentinel name.
    #[error("node name {name:?} is reserved")]
    #[diagnostic(
        code(threadflow::graph::reserved_name),
        help("START and END are virtual sentinels and cannot be registered as nodes.")
    )]
    ReservedName { name: String },

    /// No entry point was designated.
    #[error("graph has no entry point")]
    #[diagnostic(
        code(threadflow::graph::missing_entry_point),
        help("Call set_entry_point with the name of a registered node.")
    )]
    MissingEntryPoint,

    /// An edge, router target, or the entry point names an unregistered node.
    #[error("{role} references unknown node {name:?}")]
    #[diagnostic(
        code(threadflow::graph::unknown_node),
        help("Every referenced node must be registered with add_node before compile.")
    )]
    UnknownNode {
        /// Unregistered node name.
        name: String,
        /// Where the dangling reference appeared, e.g. `entry point` or
        /// `edge from "classify"`.
        role: String,
    },

    /// A node has more than one routing rule.
    #[error("node {source:?} has ambiguous routing: {detail}")]
    #[diagnostic(
        code(threadflow::graph::ambiguous_routing),
        help("A node may carry either one unconditional edge or one conditional edge set.")
    )]
    AmbiguousRouting { r#source: String, detail: String },
}
