//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use threadflow::node::{Node, NodeContext, NodeError, NodePartial};
use threadflow::reducers::StateSchema;
use threadflow::state::StateSnapshot;

/// Overwrites one field with a fixed value.
pub struct SetField {
    pub field: &'static str,
    pub value: Value,
}

#[async_trait]
impl Node for SetField {
    async fn run(&self, _: StateSnapshot, _: NodeContext) -> Result<NodePartial, NodeError> {
        Ok(NodePartial::new().with_field(self.field, self.value.clone()))
    }
}

/// Appends one item to an append-policy field.
pub struct AppendItem {
    pub field: &'static str,
    pub value: Value,
}

#[async_trait]
impl Node for AppendItem {
    async fn run(&self, _: StateSnapshot, _: NodeContext) -> Result<NodePartial, NodeError> {
        Ok(NodePartial::new().with_field(self.field, self.value.clone()))
    }
}

/// Always fails.
pub struct Failing;

#[async_trait]
impl Node for Failing {
    async fn run(&self, _: StateSnapshot, _: NodeContext) -> Result<NodePartial, NodeError> {
        Err(NodeError::Other("intentional failure".into()))
    }
}

/// Counts executions on a shared counter and optionally dawdles, so tests
/// can observe how many times a node actually ran.
pub struct Counting {
    pub counter: Arc<AtomicU64>,
    pub delay: Option<Duration>,
}

impl Counting {
    pub fn new(counter: Arc<AtomicU64>) -> Self {
        Self {
            counter,
            delay: None,
        }
    }
}

#[async_trait]
impl Node for Counting {
    async fn run(&self, _: StateSnapshot, _: NodeContext) -> Result<NodePartial, NodeError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(NodePartial::new())
    }
}

/// Cancels its own invocation's token, then succeeds. The loop should stop
/// at the next step boundary.
pub struct SelfCancelling;

#[async_trait]
impl Node for SelfCancelling {
    async fn run(&self, _: StateSnapshot, ctx: NodeContext) -> Result<NodePartial, NodeError> {
        ctx.cancellation.cancel();
        Ok(NodePartial::new().with_field("cancelled_by", json!(ctx.node)))
    }
}

/// Labels `user_input` as a question or a greeting.
pub struct Classify;

#[async_trait]
impl Node for Classify {
    async fn run(&self, snap: StateSnapshot, _: NodeContext) -> Result<NodePartial, NodeError> {
        let input = snap
            .get_str("user_input")
            .ok_or(NodeError::MissingInput { what: "user_input" })?;
        let label = if input.contains('?') {
            "question"
        } else {
            "greeting"
        };
        Ok(NodePartial::new().with_field("classification", json!(label)))
    }
}

/// Responds to a greeting.
pub struct Greeting;

#[async_trait]
impl Node for Greeting {
    async fn run(&self, _: StateSnapshot, _: NodeContext) -> Result<NodePartial, NodeError> {
        Ok(NodePartial::new().with_field("response", json!("Hello! Nice to see you!")))
    }
}

/// Responds to a question.
pub struct Question;

#[async_trait]
impl Node for Question {
    async fn run(&self, _: StateSnapshot, _: NodeContext) -> Result<NodePartial, NodeError> {
        Ok(NodePartial::new().with_field("response", json!("Let me think about that.")))
    }
}

/// Schema used by the chat-style fixtures.
pub fn chat_schema() -> StateSchema {
    StateSchema::builder()
        .overwrite("user_input")
        .overwrite("classification")
        .overwrite("response")
        .overwrite("cancelled_by")
        .append("log")
        .build()
}

/// Routes on the `classification` field; unknown values pass through as-is
/// so tests can provoke unknown-label errors.
pub fn classification_router(snap: &StateSnapshot) -> String {
    snap.get_str("classification").unwrap_or("missing").to_string()
}
