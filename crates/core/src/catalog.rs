//! Task catalog loading and validation.
//!
//! A catalog is the immutable set of tasks for one batch. It is parsed from a
//! JSON array of descriptors:
//!
//! ```json
//! [
//!   {"name": "A", "payoff": 10, "resources": [1, 2]},
//!   {"name": "B", "payoff": "4.5", "resources": [2], "execution_time": 3}
//! ]
//! ```
//!
//! Every record is validated before the optimizer ever sees it; the first bad
//! record aborts loading with [`CoreError::MalformedTask`].

use std::collections::HashSet;
use std::path::Path;

use serde_json::Value;

use crate::error::CoreError;
use crate::types::{ResourceId, Task};

/// Immutable, validated set of tasks for one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskCatalog {
    tasks: Vec<Task>,
}

impl TaskCatalog {
    /// Build a catalog from already-constructed tasks.
    ///
    /// Rejects duplicate names and negative or non-finite payoffs.
    pub fn new(tasks: Vec<Task>) -> Result<Self, CoreError> {
        let mut seen = HashSet::with_capacity(tasks.len());
        for (index, task) in tasks.iter().enumerate() {
            if task.name.is_empty() {
                return Err(malformed(index, "name must not be empty"));
            }
            if !task.payoff.is_finite() || task.payoff < 0.0 {
                return Err(malformed(
                    index,
                    format!("payoff must be a non-negative number, got {}", task.payoff),
                ));
            }
            if !seen.insert(task.name.as_str()) {
                return Err(malformed(index, format!("duplicate task name \"{}\"", task.name)));
            }
        }
        Ok(Self { tasks })
    }

    /// Read and parse a catalog file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Parse a catalog from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| CoreError::Validation(format!("Task catalog is not valid JSON: {e}")))?;
        Self::from_json_value(&value)
    }

    /// Parse a catalog from an already-decoded JSON value.
    pub fn from_json_value(value: &Value) -> Result<Self, CoreError> {
        let items = value.as_array().ok_or_else(|| {
            CoreError::Validation("Task catalog must be a JSON array".to_string())
        })?;
        let tasks = items
            .iter()
            .enumerate()
            .map(|(index, item)| parse_task(index, item))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(tasks)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Look up a task by name.
    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Sum of payoff over the full catalog.
    pub fn total_payoff(&self) -> f64 {
        self.tasks.iter().map(|t| t.payoff).sum()
    }

    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }
}

// ---------------------------------------------------------------------------
// Record parsing
// ---------------------------------------------------------------------------

fn malformed(index: usize, reason: impl Into<String>) -> CoreError {
    CoreError::MalformedTask {
        index,
        reason: reason.into(),
    }
}

fn parse_task(index: usize, item: &Value) -> Result<Task, CoreError> {
    let object = item
        .as_object()
        .ok_or_else(|| malformed(index, "record must be a JSON object"))?;

    let name = match object.get("name") {
        None | Some(Value::Null) => return Err(malformed(index, "missing field `name`")),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(malformed(index, format!("`name` must be a string, got {other}")));
        }
    };

    let payoff = match object.get("payoff") {
        None | Some(Value::Null) => return Err(malformed(index, "missing field `payoff`")),
        Some(value) => parse_payoff(value).map_err(|reason| malformed(index, reason))?,
    };

    let resources = match object.get("resources") {
        None | Some(Value::Null) => return Err(malformed(index, "missing field `resources`")),
        Some(Value::Array(values)) => values
            .iter()
            .map(parse_resource)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|reason| malformed(index, reason))?,
        Some(other) => {
            return Err(malformed(index, format!("`resources` must be an array, got {other}")))
        }
    };

    let mut task = Task::new(name, payoff, resources);
    match object.get("execution_time") {
        None | Some(Value::Null) => {}
        Some(value) => {
            let execution_time = value
                .as_u64()
                .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
                .ok_or_else(|| {
                    malformed(
                        index,
                        format!("`execution_time` must be a non-negative integer, got {value}"),
                    )
                })?;
            task = task.with_execution_time(execution_time);
        }
    }
    Ok(task)
}

/// Payoff accepts any numeric representation: JSON numbers or numeric strings.
fn parse_payoff(value: &Value) -> Result<f64, String> {
    let payoff = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| format!("`payoff` must be numeric, got {value}"))?;

    if !payoff.is_finite() || payoff < 0.0 {
        return Err(format!("`payoff` must be a non-negative number, got {value}"));
    }
    Ok(payoff)
}

fn parse_resource(value: &Value) -> Result<ResourceId, String> {
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<ResourceId>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| format!("resource ids must be integers, got {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    // -- happy path -----------------------------------------------------------

    #[test]
    fn parses_minimal_records() {
        let catalog = TaskCatalog::from_json_value(&json!([
            {"name": "A", "payoff": 10, "resources": [1]},
            {"name": "B", "payoff": 5.5, "resources": [2, 1], "execution_time": 4},
        ]))
        .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.tasks()[0], Task::new("A", 10.0, [1]));
        assert_eq!(catalog.tasks()[1].resources, vec![1, 2]);
        assert_eq!(catalog.tasks()[1].execution_time, Some(4));
        assert!((catalog.total_payoff() - 15.5).abs() < f64::EPSILON);
    }

    #[test]
    fn accepts_numeric_strings() {
        let catalog = TaskCatalog::from_json_value(&json!([
            {"name": "A", "payoff": "7.25", "resources": ["3", 4.0]},
        ]))
        .unwrap();
        let task = catalog.get("A").unwrap();
        assert!((task.payoff - 7.25).abs() < f64::EPSILON);
        assert_eq!(task.resources, vec![3, 4]);
    }

    #[test]
    fn empty_array_is_an_empty_catalog() {
        let catalog = TaskCatalog::from_json_str("[]").unwrap();
        assert!(catalog.is_empty());
    }

    // -- malformed records ----------------------------------------------------

    #[test]
    fn missing_name_is_malformed() {
        let err = TaskCatalog::from_json_value(&json!([
            {"name": "ok", "payoff": 1, "resources": []},
            {"payoff": 1, "resources": []},
        ]))
        .unwrap_err();
        assert_matches!(err, CoreError::MalformedTask { index: 1, .. });
    }

    #[test]
    fn missing_payoff_is_malformed() {
        let err = TaskCatalog::from_json_value(&json!([{"name": "A", "resources": [1]}]))
            .unwrap_err();
        assert_matches!(
            err,
            CoreError::MalformedTask { index: 0, ref reason } if reason.contains("payoff")
        );
    }

    #[test]
    fn missing_resources_is_malformed() {
        let err = TaskCatalog::from_json_value(&json!([{"name": "A", "payoff": 1}])).unwrap_err();
        assert_matches!(
            err,
            CoreError::MalformedTask { index: 0, ref reason } if reason.contains("resources")
        );
    }

    #[test]
    fn negative_payoff_is_malformed() {
        let record = json!([{"name": "A", "payoff": -1, "resources": []}]);
        let err = TaskCatalog::from_json_value(&record).unwrap_err();
        assert_matches!(err, CoreError::MalformedTask { index: 0, .. });
    }

    #[test]
    fn fractional_resource_is_malformed() {
        let record = json!([{"name": "A", "payoff": 1, "resources": [1.5]}]);
        let err = TaskCatalog::from_json_value(&record).unwrap_err();
        assert_matches!(err, CoreError::MalformedTask { index: 0, .. });
    }

    #[test]
    fn negative_execution_time_is_malformed() {
        let err = TaskCatalog::from_json_value(&json!([
            {"name": "A", "payoff": 1, "resources": [], "execution_time": -2}
        ]))
        .unwrap_err();
        assert_matches!(err, CoreError::MalformedTask { index: 0, .. });
    }

    #[test]
    fn duplicate_names_are_malformed() {
        let err = TaskCatalog::from_json_value(&json!([
            {"name": "A", "payoff": 1, "resources": []},
            {"name": "A", "payoff": 2, "resources": []},
        ]))
        .unwrap_err();
        assert_matches!(err, CoreError::MalformedTask { index: 1, .. });
    }

    #[test]
    fn non_array_document_fails_validation() {
        let err = TaskCatalog::from_json_str(r#"{"name": "A"}"#).unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }

    // -- files ----------------------------------------------------------------

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        std::fs::write(&path, r#"[{"name": "img-1", "payoff": 3, "resources": [7]}]"#).unwrap();

        let catalog = TaskCatalog::from_path(&path).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.tasks()[0].name, "img-1");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TaskCatalog::from_path(dir.path().join("nope.json")).unwrap_err();
        assert_matches!(err, CoreError::Io(_));
    }
}
