//! # Dependency edge between workers, optionally guarded by a condition.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Predicate evaluated against the referenced worker's recorded result.
pub type Condition = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// `depends_on` entry of a worker.
///
/// A plain dependency only waits for the referenced worker to complete. A
/// conditional one additionally requires the condition to hold; when it does not,
/// the dependent worker is skipped for the rest of the run.
#[derive(Clone)]
pub struct Dependency {
    id: String,
    condition: Option<Condition>,
}

impl Dependency {
    /// Unconditional dependency on `id`.
    pub fn on(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            condition: None,
        }
    }

    /// Dependency on `id` that only lets the dependent run when `condition` holds.
    ///
    /// ```
    /// use serde_json::json;
    /// use flowvisor::Dependency;
    ///
    /// let fast = Dependency::when("probe", |r| r["duration"].as_u64().is_some_and(|d| d < 60));
    /// assert!(fast.evaluate(Some(&json!({ "duration": 12 }))));
    /// assert!(!fast.evaluate(Some(&json!({ "duration": 125 }))));
    /// ```
    pub fn when(id: impl Into<String>, condition: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Self {
            id: id.into(),
            condition: Some(Arc::new(condition)),
        }
    }

    /// Referenced worker id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// True when a condition is attached.
    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }

    /// Evaluates the condition; a missing result is presented as `Value::Null`.
    pub fn evaluate(&self, result: Option<&Value>) -> bool {
        match &self.condition {
            None => true,
            Some(cond) => cond(result.unwrap_or(&Value::Null)),
        }
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("id", &self.id)
            .field("conditional", &self.is_conditional())
            .finish()
    }
}

impl From<&str> for Dependency {
    fn from(id: &str) -> Self {
        Dependency::on(id)
    }
}

impl From<String> for Dependency {
    fn from(id: String) -> Self {
        Dependency::on(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_dependency_always_passes() {
        let dep: Dependency = "a".into();
        assert!(!dep.is_conditional());
        assert!(dep.evaluate(None));
    }

    #[test]
    fn missing_result_is_null() {
        let dep = Dependency::when("a", |r| r.is_null());
        assert!(dep.evaluate(None));
        assert!(!dep.evaluate(Some(&json!(1))));
    }
}
