//! Merge policies: how partial updates fold into run state.
//!
//! Every state field a graph's nodes may write carries exactly one
//! [`MergePolicy`], declared up front on the [`StateSchema`]. The policy is
//! fixed for the lifetime of the graph, which removes the silent
//! last-write-wins ambiguity of an implicit dictionary merge: a field is
//! either overwritten, appended to, or folded by a caller-supplied reducer,
//! and a field with no declared policy is a merge error rather than a silent
//! insert.

mod schema;

pub use schema::{StateSchema, StateSchemaBuilder};

use miette::Diagnostic;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Binary fold for [`MergePolicy::Reduce`]: `(existing, incoming) -> merged`.
pub type ReduceFn = Arc<dyn Fn(Value, Value) -> Value + Send + Sync + 'static>;

/// Declared merge behavior for one state field.
#[derive(Clone)]
pub enum MergePolicy {
    /// The incoming value replaces the existing one. Default policy.
    Overwrite,

    /// The incoming value is concatenated onto an ordered JSON array.
    ///
    /// An incoming array contributes its elements; any other incoming value
    /// is pushed as a single element. A missing field starts as an empty
    /// array. An existing non-array value is a merge error.
    Append,

    /// A caller-supplied binary function folds the incoming value into the
    /// existing one. When the field is absent, the incoming value is stored
    /// directly (the fold has no left operand yet).
    Reduce(ReduceFn),
}

impl MergePolicy {
    /// Convenience constructor for a custom reducer.
    pub fn reduce(f: impl Fn(Value, Value) -> Value + Send + Sync + 'static) -> Self {
        MergePolicy::Reduce(Arc::new(f))
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            MergePolicy::Overwrite => "overwrite",
            MergePolicy::Append => "append",
            MergePolicy::Reduce(_) => "reduce",
        }
    }
}

impl fmt::Debug for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// Errors raised while merging a node's partial update into run state.
///
/// A merge error is terminal for the invocation and no checkpoint is written
/// for the failing step.
#[derive(Debug, Error, Diagnostic)]
pub enum StateMergeError {
    /// A node returned a field with no declared merge policy.
    #[error("field {field:?} has no declared merge policy")]
    #[diagnostic(
        code(threadflow::merge::undeclared_field),
        help("Declare the field on the StateSchema before compiling the graph.")
    )]
    UndeclaredField { field: String },

    /// An `append` field holds a non-array value.
    #[error("field {field:?} is declared append but holds non-array value of type {found}")]
    #[diagnostic(
        code(threadflow::merge::not_appendable),
        help("Seed append fields with a JSON array (or leave them unset).")
    )]
    NotAppendable { field: String, found: &'static str },
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
