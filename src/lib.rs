//! # threadflow
//!
//! A stateful workflow engine: a directed graph of named nodes executing
//! sequentially over shared JSON state, with conditional routing decided at
//! runtime and durable per-thread checkpointing for crash recovery and
//! multi-session continuity.
//!
//! ## Core concepts
//!
//! - **Nodes** ([`node::Node`]): async units of work. Each receives a
//!   read-only [`state::StateSnapshot`] and returns a
//!   [`node::NodePartial`] of the fields it wants to change.
//! - **Merge policies** ([`reducers`]): every writable field declares how
//!   updates fold in (overwrite, append, or a custom reducer), fixed at
//!   compile time on the [`reducers::StateSchema`].
//! - **Graphs** ([`graph::GraphBuilder`]): nodes plus unconditional edges
//!   and conditional edge sets, compiled into an [`app::App`] after
//!   structural validation.
//! - **Threads** ([`runtime`]): invoke with a thread id and every step is
//!   checkpointed; a later invocation with the same id resumes exactly
//!   where the last one stopped, surviving process restarts with the
//!   SQLite store (feature `sqlite`).
//!
//! ## Quickstart
//!
//! ```rust
//! use threadflow::graph::GraphBuilder;
//! use threadflow::node::{Node, NodeContext, NodeError, NodePartial};
//! use threadflow::reducers::StateSchema;
//! use threadflow::state::{GraphState, StateSnapshot};
//! use async_trait::async_trait;
//! use serde_json::json;
//!
//! struct Classify;
//!
//! #[async_trait]
//! impl Node for Classify {
//!     async fn run(&self, snap: StateSnapshot, _: NodeContext) -> Result<NodePartial, NodeError> {
//!         let label = if snap.get_str("user_input").is_some_and(|s| s.contains('?')) {
//!             "question"
//!         } else {
//!             "greeting"
//!         };
//!         Ok(NodePartial::new().with_field("classification", json!(label)))
//!     }
//! }
//!
//! struct Respond;
//!
//! #[async_trait]
//! impl Node for Respond {
//!     async fn run(&self, snap: StateSnapshot, _: NodeContext) -> Result<NodePartial, NodeError> {
//!         let reply = match snap.get_str("classification") {
//!             Some("question") => "Let me think about that.",
//!             _ => "Hello! Nice to see you!",
//!         };
//!         Ok(NodePartial::new().with_field("response", json!(reply)))
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let app = GraphBuilder::new()
//!     .with_state_schema(
//!         StateSchema::builder()
//!             .overwrite("user_input")
//!             .overwrite("classification")
//!             .overwrite("response")
//!             .build(),
//!     )
//!     .add_node("classify", Classify)
//!     .add_node("respond", Respond)
//!     .set_entry_point("classify")
//!     .add_edge("classify", "respond")
//!     .set_finish_point("respond")
//!     .compile()?;
//!
//! let final_state = app
//!     .invoke(GraphState::builder().with_value("user_input", json!("Hi there!")).build())
//!     .await?;
//! assert_eq!(
//!     final_state.get("response"),
//!     Some(&json!("Hello! Nice to see you!"))
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Execution model
//!
//! The loop is strictly sequential: exactly one node runs at a time. Each
//! step executes the current node, merges its partial update, resolves the
//! route against the post-merge state, persists a checkpoint (when a thread
//! id is present), then advances. Reaching the `END` sentinel completes the
//! invocation. Cancellation, deadlines, and the step limit are enforced at
//! step boundaries, so the last checkpoint always reflects a fully
//! completed step.

pub mod app;
pub mod graph;
pub mod node;
pub mod reducers;
pub mod runtime;
pub mod state;
pub mod telemetry;
pub mod types;
pub mod utils;
