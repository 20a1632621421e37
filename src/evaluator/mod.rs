pub mod plugins;

use crate::core::{Record, RepoError, Result, Value};
use crate::query::{FieldPath, Predicate};

/// Supplies the value of a field path for the row being evaluated.
pub trait ValueSource {
    fn value(&self, path: &FieldPath) -> Result<Value>;
}

impl ValueSource for Record {
    fn value(&self, path: &FieldPath) -> Result<Value> {
        self.get(path.as_str())
            .cloned()
            .ok_or_else(|| RepoError::Execution(format!("Row has no value for path '{}'", path)))
    }
}

/// Evaluates one kind of predicate node.
///
/// Results are three-valued: `Boolean(true)`, `Boolean(false)` or `Null` for unknown.
pub trait PredicateEvaluator: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_evaluate(&self, predicate: &Predicate) -> bool;

    fn evaluate(
        &self,
        predicate: &Predicate,
        source: &dyn ValueSource,
        context: &EvaluationContext<'_>,
    ) -> Result<Value>;
}

pub struct EvaluationContext<'a> {
    registry: &'a EvaluatorRegistry,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(registry: &'a EvaluatorRegistry) -> Self {
        Self { registry }
    }

    pub fn evaluate(&self, predicate: &Predicate, source: &dyn ValueSource) -> Result<Value> {
        if let Predicate::True = predicate {
            return Ok(Value::Boolean(true));
        }

        if let Some(evaluator) = self.registry.find_evaluator(predicate) {
            return evaluator.evaluate(predicate, source, self);
        }

        Err(RepoError::Execution(format!(
            "No evaluator found for predicate: {}",
            predicate
        )))
    }

    /// A row matches only when the predicate is definitely true.
    pub fn matches(&self, predicate: &Predicate, source: &dyn ValueSource) -> Result<bool> {
        Ok(matches!(
            self.evaluate(predicate, source)?,
            Value::Boolean(true)
        ))
    }
}

pub struct EvaluatorRegistry {
    evaluators: Vec<Box<dyn PredicateEvaluator>>,
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        Self {
            evaluators: Vec::new(),
        }
    }

    pub fn register(&mut self, evaluator: Box<dyn PredicateEvaluator>) {
        log::trace!("Registered predicate evaluator: {}", evaluator.name());
        self.evaluators.push(evaluator);
    }

    pub fn with_default_evaluators() -> Self {
        use plugins::*;

        let mut registry = Self::new();

        registry.register(Box::new(logical::LogicalEvaluator));
        registry.register(Box::new(comparison::ComparisonEvaluator));
        registry.register(Box::new(like::LikeEvaluator));
        registry.register(Box::new(is_null::IsNullEvaluator));
        registry.register(Box::new(in_list::InListEvaluator));

        registry
    }

    fn find_evaluator(&self, predicate: &Predicate) -> Option<&dyn PredicateEvaluator> {
        self.evaluators
            .iter()
            .find(|ev| ev.can_evaluate(predicate))
            .map(|boxed| &**boxed)
    }
}

impl Default for EvaluatorRegistry {
    fn default() -> Self {
        Self::with_default_evaluators()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ComparisonOp;

    fn matches(predicate: &Predicate, record: &Record) -> bool {
        let registry = EvaluatorRegistry::with_default_evaluators();
        EvaluationContext::new(&registry)
            .matches(predicate, record)
            .unwrap()
    }

    #[test]
    fn test_composed_predicate() {
        let m1 = Record::new().with("username", "m1").with("team.name", "teamA");
        let m2 = Record::new().with("username", "m2").with("team.name", "teamA");
        let predicate = Predicate::eq("username", "m1").and(Predicate::eq("team.name", "teamA"));
        assert!(matches(&predicate, &m1));
        assert!(!matches(&predicate, &m2));
    }

    #[test]
    fn test_null_comparison_is_unknown() {
        let row = Record::new().with("age", Value::Null);
        let gt = Predicate::compare("age", ComparisonOp::Gt, 10);
        assert!(!matches(&gt, &row));
        assert!(!matches(&gt.clone().negate(), &row));
        assert!(matches(&Predicate::is_null("age"), &row));
    }

    #[test]
    fn test_or_with_unknown() {
        let row = Record::new().with("age", Value::Null).with("username", "m1");
        let predicate = Predicate::compare("age", ComparisonOp::Gt, 10).or(Predicate::eq("username", "m1"));
        assert!(matches(&predicate, &row));
    }

    #[test]
    fn test_missing_path_is_an_error() {
        let registry = EvaluatorRegistry::with_default_evaluators();
        let err = EvaluationContext::new(&registry)
            .matches(&Predicate::eq("missing", 1), &Record::new())
            .unwrap_err();
        assert!(matches!(err, RepoError::Execution(_)));
    }
}
