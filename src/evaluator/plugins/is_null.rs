use super::super::{EvaluationContext, PredicateEvaluator, ValueSource};
use crate::core::{RepoError, Result, Value};
use crate::query::Predicate;

pub struct IsNullEvaluator;

impl PredicateEvaluator for IsNullEvaluator {
    fn name(&self) -> &'static str {
        "IS_NULL"
    }

    fn can_evaluate(&self, predicate: &Predicate) -> bool {
        matches!(predicate, Predicate::IsNull { .. })
    }

    fn evaluate(
        &self,
        predicate: &Predicate,
        source: &dyn ValueSource,
        _context: &EvaluationContext<'_>,
    ) -> Result<Value> {
        let Predicate::IsNull { path, negated } = predicate else {
            return Err(RepoError::Execution("Invalid IS NULL predicate".into()));
        };

        let is_null = source.value(path)?.is_null();
        Ok(Value::Boolean(is_null != *negated))
    }
}
