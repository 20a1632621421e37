use super::super::{EvaluationContext, PredicateEvaluator, ValueSource};
use crate::core::{RepoError, Result, Value};
use crate::query::Predicate;

pub struct InListEvaluator;

impl PredicateEvaluator for InListEvaluator {
    fn name(&self) -> &'static str {
        "IN_LIST"
    }

    fn can_evaluate(&self, predicate: &Predicate) -> bool {
        matches!(predicate, Predicate::In { .. })
    }

    fn evaluate(
        &self,
        predicate: &Predicate,
        source: &dyn ValueSource,
        _context: &EvaluationContext<'_>,
    ) -> Result<Value> {
        let Predicate::In {
            path,
            values,
            negated,
        } = predicate
        else {
            return Err(RepoError::Execution("Invalid IN predicate".into()));
        };

        let left = source.value(path)?;
        if left.is_null() {
            return Ok(Value::Null);
        }

        let mut saw_null = false;

        for item in values {
            if item.is_null() {
                saw_null = true;
                continue;
            }
            if left == *item {
                return Ok(Value::Boolean(!*negated));
            }
        }

        if saw_null {
            return Ok(Value::Null);
        }

        Ok(Value::Boolean(*negated))
    }
}
