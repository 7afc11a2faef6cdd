//! Graph definition and compilation.
//!
//! A workflow graph is declared with [`GraphBuilder`]: register nodes, wire
//! unconditional edges and conditional edge sets, designate an entry point,
//! and declare the state schema. [`GraphBuilder::compile`] validates the
//! definition and produces an [`App`](crate::app::App) ready to invoke.

pub mod builder;
pub mod compilation;
pub mod edges;
pub mod errors;

pub use builder::GraphBuilder;
pub use edges::{ConditionalEdges, Router};
pub use errors::GraphDefinitionError;
