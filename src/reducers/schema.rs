use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::instrument;

use super::{MergePolicy, StateMergeError, json_type_name};
use crate::node::NodePartial;
use crate::state::GraphState;

/// Declared merge policies for every mergeable state field.
///
/// The schema is fixed at graph compile time. During execution it is the only
/// path through which a [`NodePartial`] reaches the run state: each proposed
/// field is folded in by its declared [`MergePolicy`], and an undeclared
/// field fails the merge.
///
/// # Examples
///
/// ```rust
/// use threadflow::reducers::{MergePolicy, StateSchema};
///
/// let schema = StateSchema::builder()
///     .field("user_input", MergePolicy::Overwrite)
///     .field("responses", MergePolicy::Append)
///     .build();
/// assert!(schema.policy("responses").is_some());
/// assert!(schema.policy("unknown").is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct StateSchema {
    policies: FxHashMap<String, MergePolicy>,
}

impl StateSchema {
    pub fn builder() -> StateSchemaBuilder {
        StateSchemaBuilder::default()
    }

    /// The declared policy for a field, if any.
    #[must_use]
    pub fn policy(&self, field: &str) -> Option<&MergePolicy> {
        self.policies.get(field)
    }

    /// Number of declared fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Declared field names in sorted order.
    #[must_use]
    pub fn sorted_field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.policies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Folds a partial update into the run state.
    ///
    /// Entries are applied in sorted field order so the outcome never depends
    /// on hash-map iteration. On the first error the state is left as it was
    /// before the call: policies are checked for every entry up front, and
    /// per-entry failure modes (`NotAppendable`) are validated before any
    /// write happens.
    #[instrument(skip_all, fields(updates = partial.len()))]
    pub fn apply(
        &self,
        state: &mut GraphState,
        partial: &NodePartial,
    ) -> Result<(), StateMergeError> {
        let entries = partial.sorted_entries();

        // Validate the whole batch before mutating anything, so a failing
        // merge leaves the state untouched and the prior checkpoint accurate.
        for &(field, _) in &entries {
            let policy =
                self.policies
                    .get(field)
                    .ok_or_else(|| StateMergeError::UndeclaredField {
                        field: field.to_string(),
                    })?;
            if matches!(policy, MergePolicy::Append) {
                if let Some(existing) = state.get(field) {
                    if !existing.is_array() {
                        return Err(StateMergeError::NotAppendable {
                            field: field.to_string(),
                            found: json_type_name(existing),
                        });
                    }
                }
            }
        }

        for (field, incoming) in entries {
            // Policy presence was checked above.
            let Some(policy) = self.policies.get(field) else {
                continue;
            };
            let fields = state.fields_mut();
            match policy {
                MergePolicy::Overwrite => {
                    fields.insert(field.to_string(), incoming.clone());
                }
                MergePolicy::Append => {
                    let slot = fields
                        .entry(field.to_string())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if let Value::Array(items) = slot {
                        match incoming {
                            Value::Array(new_items) => items.extend(new_items.iter().cloned()),
                            other => items.push(other.clone()),
                        }
                    }
                }
                MergePolicy::Reduce(reduce) => {
                    let merged = match fields.remove(field) {
                        Some(existing) => reduce(existing, incoming.clone()),
                        None => incoming.clone(),
                    };
                    fields.insert(field.to_string(), merged);
                }
            }
        }

        Ok(())
    }
}

/// Fluent builder for [`StateSchema`].
#[derive(Debug, Default)]
pub struct StateSchemaBuilder {
    policies: FxHashMap<String, MergePolicy>,
}

impl StateSchemaBuilder {
    /// Declares a field with an explicit merge policy. Redeclaring a field
    /// replaces its policy.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, policy: MergePolicy) -> Self {
        self.policies.insert(name.into(), policy);
        self
    }

    /// Declares a field with the default [`MergePolicy::Overwrite`] policy.
    #[must_use]
    pub fn overwrite(self, name: impl Into<String>) -> Self {
        self.field(name, MergePolicy::Overwrite)
    }

    /// Declares an ordered-collection field with [`MergePolicy::Append`].
    #[must_use]
    pub fn append(self, name: impl Into<String>) -> Self {
        self.field(name, MergePolicy::Append)
    }

    pub fn build(self) -> StateSchema {
        StateSchema {
            policies: self.policies,
        }
    }
}
