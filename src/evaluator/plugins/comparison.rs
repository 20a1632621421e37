use super::super::{EvaluationContext, PredicateEvaluator, ValueSource};
use crate::core::{RepoError, Result, Value};
use crate::query::{ComparisonOp, Predicate};
use std::cmp::Ordering;

pub struct ComparisonEvaluator;

impl PredicateEvaluator for ComparisonEvaluator {
    fn name(&self) -> &'static str {
        "COMPARISON"
    }

    fn can_evaluate(&self, predicate: &Predicate) -> bool {
        if let Predicate::Comparison { op, .. } = predicate {
            !matches!(op, ComparisonOp::Like | ComparisonOp::NotLike)
        } else {
            false
        }
    }

    fn evaluate(
        &self,
        predicate: &Predicate,
        source: &dyn ValueSource,
        _context: &EvaluationContext<'_>,
    ) -> Result<Value> {
        let Predicate::Comparison { path, op, value } = predicate else {
            return Err(RepoError::Execution("Invalid comparison predicate".into()));
        };

        let left = source.value(path)?;
        self.compare(&left, value, *op)
    }
}

impl ComparisonEvaluator {
    pub fn compare(&self, left: &Value, right: &Value, op: ComparisonOp) -> Result<Value> {
        if left.is_null() || right.is_null() {
            return Ok(Value::Null);
        }

        let ordering = left.compare(right)?;
        let result = match op {
            ComparisonOp::Eq => ordering == Ordering::Equal,
            ComparisonOp::NotEq => ordering != Ordering::Equal,
            ComparisonOp::Lt => ordering == Ordering::Less,
            ComparisonOp::LtEq => ordering != Ordering::Greater,
            ComparisonOp::Gt => ordering == Ordering::Greater,
            ComparisonOp::GtEq => ordering != Ordering::Less,
            ComparisonOp::Like | ComparisonOp::NotLike => {
                return Err(RepoError::Execution(format!(
                    "'{}' is not a comparison operator",
                    op.symbol()
                )));
            }
        };
        Ok(Value::Boolean(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_numeric_comparison() {
        let evaluator = ComparisonEvaluator;
        let result = evaluator
            .compare(&Value::Integer(20), &Value::Float(19.5), ComparisonOp::Gt)
            .unwrap();
        assert_eq!(result, Value::Boolean(true));
    }

    #[test]
    fn test_incompatible_types() {
        let evaluator = ComparisonEvaluator;
        let err = evaluator
            .compare(&Value::Integer(1), &Value::Text("1".into()), ComparisonOp::Eq)
            .unwrap_err();
        assert!(matches!(err, RepoError::TypeMismatch(_)));
    }
}
