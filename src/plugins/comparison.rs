use super::{ExpressionConverter, ExpressionPlugin, Operand};
use crate::core::{RepoError, Result};
use crate::query::{ComparisonOp, Predicate};
use sqlparser::ast as sql_ast;

pub struct ComparisonPlugin;

impl ComparisonPlugin {
    fn convert_op(op: &sql_ast::BinaryOperator) -> Option<ComparisonOp> {
        use sql_ast::BinaryOperator as SqlOp;

        match op {
            SqlOp::Eq => Some(ComparisonOp::Eq),
            SqlOp::NotEq => Some(ComparisonOp::NotEq),
            SqlOp::Lt => Some(ComparisonOp::Lt),
            SqlOp::LtEq => Some(ComparisonOp::LtEq),
            SqlOp::Gt => Some(ComparisonOp::Gt),
            SqlOp::GtEq => Some(ComparisonOp::GtEq),
            _ => None,
        }
    }

    /// Operator seen from the right-hand side: `10 < age` is `age > 10`.
    fn mirror(op: ComparisonOp) -> ComparisonOp {
        match op {
            ComparisonOp::Lt => ComparisonOp::Gt,
            ComparisonOp::LtEq => ComparisonOp::GtEq,
            ComparisonOp::Gt => ComparisonOp::Lt,
            ComparisonOp::GtEq => ComparisonOp::LtEq,
            other => other,
        }
    }
}

impl ExpressionPlugin for ComparisonPlugin {
    fn name(&self) -> &'static str {
        "COMPARISON"
    }

    fn can_handle(&self, expr: &sql_ast::Expr) -> bool {
        if let sql_ast::Expr::BinaryOp { op, .. } = expr {
            Self::convert_op(op).is_some()
        } else {
            false
        }
    }

    fn convert(&self, expr: sql_ast::Expr, converter: &ExpressionConverter<'_>) -> Result<Predicate> {
        let (left, op, right) = match expr {
            sql_ast::Expr::BinaryOp { left, op, right } => (left, op, right),
            other => {
                return Err(RepoError::MalformedQuery(format!(
                    "Expected a comparison, got: {}",
                    other
                )));
            }
        };
        let Some(op) = Self::convert_op(&op) else {
            return Err(RepoError::MalformedQuery(format!(
                "Unsupported comparison operator: {}",
                op
            )));
        };

        match (converter.operand(&left)?, converter.operand(&right)?) {
            (Operand::Path(path), Operand::Value(value)) => Ok(Predicate::compare(path, op, value)),
            (Operand::Value(value), Operand::Path(path)) => {
                Ok(Predicate::compare(path, Self::mirror(op), value))
            }
            (Operand::Path(a), Operand::Path(b)) => Err(RepoError::MalformedQuery(format!(
                "Column-to-column comparison '{} {} {}' is only supported in JOIN ... ON",
                a,
                op.symbol(),
                b
            ))),
            (Operand::Value(a), Operand::Value(b)) => Err(RepoError::MalformedQuery(format!(
                "Comparison between two literals '{} {} {}'",
                a,
                op.symbol(),
                b
            ))),
        }
    }
}
