//! State containers flowing through the graph.
//!
//! The engine's state is a mapping from field name to [`serde_json::Value`].
//! [`GraphState`] is the mutable container owned by the execution loop;
//! [`StateSnapshot`] is the read-only view handed to node handlers and
//! routers. How a node's partial update combines with existing fields is
//! governed by the merge policies in [`crate::reducers`], never by the
//! containers themselves.
//!
//! # Examples
//!
//! ```rust
//! use threadflow::state::GraphState;
//! use serde_json::json;
//!
//! let state = GraphState::builder()
//!     .with_value("user_input", json!("Hi there!"))
//!     .with_value("attempts", json!(0))
//!     .build();
//!
//! let snapshot = state.snapshot();
//! assert_eq!(snapshot.get_str("user_input"), Some("Hi there!"));
//! assert_eq!(snapshot.len(), 2);
//! ```

use rustc_hash::FxHashMap;
use serde_json::Value;

/// The mutable state container for one invocation.
///
/// Fields are named JSON values; the set of *mergeable* fields and their
/// policies is declared on the graph, not here. The loop mutates this
/// container exclusively through [`StateSchema::apply`](crate::reducers::StateSchema::apply),
/// so every write passes a declared merge policy.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphState {
    fields: FxHashMap<String, Value>,
}

impl GraphState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for ergonomic initial-state construction.
    pub fn builder() -> GraphStateBuilder {
        GraphStateBuilder::default()
    }

    /// Rebuild a state from raw fields (used when restoring checkpoints).
    pub(crate) fn from_fields(fields: FxHashMap<String, Value>) -> Self {
        Self { fields }
    }

    /// Read a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Number of populated fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field names in sorted order, for deterministic iteration.
    #[must_use]
    pub fn sorted_field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.fields.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Mutable access for the merge layer. Not public: callers go through
    /// [`crate::reducers::StateSchema::apply`].
    pub(crate) fn fields_mut(&mut self) -> &mut FxHashMap<String, Value> {
        &mut self.fields
    }

    pub(crate) fn fields(&self) -> &FxHashMap<String, Value> {
        &self.fields
    }

    /// Creates an immutable snapshot of the current state.
    ///
    /// Snapshots clone the field map, so they stay valid however the
    /// underlying state evolves afterwards. This is what handlers and
    /// routers receive.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            fields: self.fields.clone(),
        }
    }
}

/// Read-only view of state at a specific point in the run.
///
/// Handed to node handlers and conditional routers. Handlers cannot write
/// through a snapshot; they return a [`NodePartial`](crate::node::NodePartial)
/// instead and the loop merges it.
#[derive(Clone, Debug, Default)]
pub struct StateSnapshot {
    fields: FxHashMap<String, Value>,
}

impl StateSnapshot {
    /// Read a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Read a field as a string slice, when it holds a JSON string.
    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Builder for constructing an initial [`GraphState`].
#[derive(Debug, Default)]
pub struct GraphStateBuilder {
    fields: FxHashMap<String, Value>,
}

impl GraphStateBuilder {
    /// Sets an initial field value. Later calls for the same field win.
    #[must_use]
    pub fn with_value(mut self, field: impl Into<String>, value: Value) -> Self {
        self.fields.insert(field.into(), value);
        self
    }

    pub fn build(self) -> GraphState {
        GraphState {
            fields: self.fields,
        }
    }
}
