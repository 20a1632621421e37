use super::super::{EvaluationContext, PredicateEvaluator, ValueSource};
use crate::core::{RepoError, Result, Value};
use crate::expression::pattern::eval_like;
use crate::query::{ComparisonOp, Predicate};

pub struct LikeEvaluator;

impl PredicateEvaluator for LikeEvaluator {
    fn name(&self) -> &'static str {
        "LIKE"
    }

    fn can_evaluate(&self, predicate: &Predicate) -> bool {
        matches!(
            predicate,
            Predicate::Comparison {
                op: ComparisonOp::Like | ComparisonOp::NotLike,
                ..
            }
        )
    }

    fn evaluate(
        &self,
        predicate: &Predicate,
        source: &dyn ValueSource,
        _context: &EvaluationContext<'_>,
    ) -> Result<Value> {
        let Predicate::Comparison { path, op, value } = predicate else {
            return Err(RepoError::Execution("Invalid LIKE predicate".into()));
        };

        let text = source.value(path)?;
        if text.is_null() || value.is_null() {
            return Ok(Value::Null);
        }

        let (Value::Text(text), Value::Text(pattern)) = (&text, value) else {
            return Err(RepoError::TypeMismatch(format!(
                "LIKE requires text operands, got {} and {}",
                text.type_name(),
                value.type_name()
            )));
        };

        let matched = eval_like(text, pattern, true)?;
        Ok(Value::Boolean(matched != (*op == ComparisonOp::NotLike)))
    }
}
