//! Run id generation.

use uuid::Uuid;

/// Fresh identifier for one invocation, used to correlate log lines.
/// Distinct from thread ids, which are caller-supplied and durable.
#[must_use]
pub fn new_run_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(new_run_id(), new_run_id());
    }
}
