//! Serde models for checkpoint storage.
//!
//! Storage backends serialize these models rather than the in-memory types,
//! which keeps the wire format stable even as runtime types grow fields.
//! State fields are kept in a `BTreeMap` so serialized output is byte-stable
//! across runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::checkpointer::Checkpoint;
use crate::state::GraphState;
use crate::types::NodeId;

/// Serialized form of [`GraphState`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersistedState {
    pub fields: BTreeMap<String, Value>,
}

impl From<&GraphState> for PersistedState {
    fn from(state: &GraphState) -> Self {
        Self {
            fields: state
                .fields()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

impl From<PersistedState> for GraphState {
    fn from(persisted: PersistedState) -> Self {
        GraphState::from_fields(persisted.fields.into_iter().collect())
    }
}

/// Serialized form of [`Checkpoint`].
///
/// `next_node` carries the string encoding from [`NodeId::encode`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedCheckpoint {
    pub thread_id: String,
    pub seq: u64,
    pub state: PersistedState,
    pub next_node: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Checkpoint> for PersistedCheckpoint {
    fn from(checkpoint: &Checkpoint) -> Self {
        Self {
            thread_id: checkpoint.thread_id.clone(),
            seq: checkpoint.seq,
            state: PersistedState::from(&checkpoint.state),
            next_node: checkpoint.next_node.encode(),
            created_at: checkpoint.created_at,
        }
    }
}

impl From<PersistedCheckpoint> for Checkpoint {
    fn from(persisted: PersistedCheckpoint) -> Self {
        Checkpoint {
            thread_id: persisted.thread_id,
            seq: persisted.seq,
            state: persisted.state.into(),
            next_node: NodeId::decode(&persisted.next_node),
            created_at: persisted.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn checkpoint_round_trips_through_persisted_form() {
        let checkpoint = Checkpoint {
            thread_id: "user_123".into(),
            seq: 2,
            state: GraphState::builder()
                .with_value("classification", json!("greeting"))
                .build(),
            next_node: NodeId::End,
            created_at: Utc::now(),
        };

        let persisted = PersistedCheckpoint::from(&checkpoint);
        let json = serde_json::to_string(&persisted).unwrap();
        let restored: Checkpoint = serde_json::from_str::<PersistedCheckpoint>(&json)
            .unwrap()
            .into();

        assert_eq!(restored.thread_id, "user_123");
        assert_eq!(restored.seq, 2);
        assert_eq!(restored.next_node, NodeId::End);
        assert_eq!(
            restored.state.get("classification"),
            Some(&json!("greeting"))
        );
    }

    #[test]
    fn persisted_state_field_order_is_stable() {
        let state = GraphState::builder()
            .with_value("b", json!(1))
            .with_value("a", json!(2))
            .build();
        let a = serde_json::to_string(&PersistedState::from(&state)).unwrap();
        let b = serde_json::to_string(&PersistedState::from(&state)).unwrap();
        assert_eq!(a, b);
        assert!(a.find("\"a\"").unwrap() < a.find("\"b\"").unwrap());
    }
}
