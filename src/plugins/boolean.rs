use super::{ExpressionConverter, ExpressionPlugin};
use crate::core::{RepoError, Result};
use crate::query::Predicate;
use sqlparser::ast as sql_ast;

pub struct BooleanPlugin;

impl ExpressionPlugin for BooleanPlugin {
    fn name(&self) -> &'static str {
        "BOOLEAN"
    }

    fn can_handle(&self, expr: &sql_ast::Expr) -> bool {
        match expr {
            sql_ast::Expr::BinaryOp { op, .. } => {
                matches!(
                    op,
                    sql_ast::BinaryOperator::And | sql_ast::BinaryOperator::Or
                )
            }
            sql_ast::Expr::UnaryOp { op, .. } => {
                matches!(op, sql_ast::UnaryOperator::Not)
            }
            _ => false,
        }
    }

    fn convert(&self, expr: sql_ast::Expr, converter: &ExpressionConverter<'_>) -> Result<Predicate> {
        match expr {
            sql_ast::Expr::BinaryOp {
                left,
                op: sql_ast::BinaryOperator::And,
                right,
            } => Ok(converter.convert(*left)?.and(converter.convert(*right)?)),
            sql_ast::Expr::BinaryOp {
                left,
                op: sql_ast::BinaryOperator::Or,
                right,
            } => Ok(converter.convert(*left)?.or(converter.convert(*right)?)),
            sql_ast::Expr::UnaryOp {
                op: sql_ast::UnaryOperator::Not,
                expr,
            } => Ok(converter.convert(*expr)?.negate()),
            other => Err(RepoError::MalformedQuery(format!(
                "Expected AND, OR or NOT, got: {}",
                other
            ))),
        }
    }
}
