use super::super::{EvaluationContext, PredicateEvaluator, ValueSource};
use crate::core::{RepoError, Result, Value};
use crate::query::Predicate;

/// AND, OR and NOT under three-valued logic.
pub struct LogicalEvaluator;

impl PredicateEvaluator for LogicalEvaluator {
    fn name(&self) -> &'static str {
        "LOGICAL"
    }

    fn can_evaluate(&self, predicate: &Predicate) -> bool {
        matches!(
            predicate,
            Predicate::And(_) | Predicate::Or(_) | Predicate::Not(_)
        )
    }

    fn evaluate(
        &self,
        predicate: &Predicate,
        source: &dyn ValueSource,
        context: &EvaluationContext<'_>,
    ) -> Result<Value> {
        match predicate {
            Predicate::And(children) => {
                let mut unknown = false;
                for child in children {
                    match context.evaluate(child, source)? {
                        Value::Boolean(false) => return Ok(Value::Boolean(false)),
                        Value::Null => unknown = true,
                        _ => {}
                    }
                }
                Ok(if unknown { Value::Null } else { Value::Boolean(true) })
            }

            Predicate::Or(children) => {
                let mut unknown = false;
                for child in children {
                    match context.evaluate(child, source)? {
                        Value::Boolean(true) => return Ok(Value::Boolean(true)),
                        Value::Null => unknown = true,
                        _ => {}
                    }
                }
                Ok(if unknown { Value::Null } else { Value::Boolean(false) })
            }

            Predicate::Not(inner) => match context.evaluate(inner, source)? {
                Value::Null => Ok(Value::Null),
                Value::Boolean(b) => Ok(Value::Boolean(!b)),
                other => Err(RepoError::TypeMismatch(format!(
                    "NOT expects a boolean, got {}",
                    other.type_name()
                ))),
            },

            _ => Err(RepoError::Execution(format!(
                "Not a logical predicate: {}",
                predicate
            ))),
        }
    }
}
