//! Task specification: the immutable input to a pipeline run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// What the pipeline is asked to produce.
///
/// Built once by the caller and never mutated by any stage; the loop hands
/// the same `TaskSpec` to the producer, evaluator, and refiner on every
/// iteration. Constraints are an ordered map so serialized specs and prompt
/// assembly are deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Caller-chosen identifier; used as the merge key in fan-out runs.
    pub id: String,
    /// What to produce, in plain language.
    pub objective: String,
    /// Optional output format hint (e.g. "tweet", "sql", "markdown").
    pub format: Option<String>,
    /// Named constraints forwarded to the stages (tone, audience, schema...).
    pub constraints: BTreeMap<String, String>,
}

impl TaskSpec {
    /// Creates a spec with the given id and objective, no format, no constraints.
    pub fn new(id: impl Into<String>, objective: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            objective: objective.into(),
            format: None,
            constraints: BTreeMap::new(),
        }
    }

    /// Set the output format hint (builder).
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Add one named constraint (builder).
    pub fn with_constraint(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.constraints.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: new() sets id and objective; format and constraints are empty.
    #[test]
    fn new_sets_id_and_objective() {
        let task = TaskSpec::new("t1", "write a haiku");
        assert_eq!(task.id, "t1");
        assert_eq!(task.objective, "write a haiku");
        assert!(task.format.is_none());
        assert!(task.constraints.is_empty());
    }

    /// **Scenario**: Builder chain sets format and accumulates constraints in key order.
    #[test]
    fn builder_sets_format_and_constraints() {
        let task = TaskSpec::new("t2", "summarize")
            .with_format("markdown")
            .with_constraint("tone", "formal")
            .with_constraint("audience", "engineers");
        assert_eq!(task.format.as_deref(), Some("markdown"));
        let keys: Vec<&str> = task.constraints.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["audience", "tone"]);
    }

    /// **Scenario**: TaskSpec round-trips through serde_json unchanged.
    #[test]
    fn serde_round_trip() {
        let task = TaskSpec::new("t3", "report").with_constraint("length", "short");
        let json = serde_json::to_string(&task).unwrap();
        let back: TaskSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, task);
    }
}
