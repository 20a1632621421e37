use super::{ExpressionConverter, ExpressionPlugin};
use crate::core::{RepoError, Result};
use crate::query::Predicate;
use sqlparser::ast as sql_ast;

pub struct NestedPlugin;

impl ExpressionPlugin for NestedPlugin {
    fn name(&self) -> &'static str {
        "NESTED"
    }

    fn can_handle(&self, expr: &sql_ast::Expr) -> bool {
        matches!(expr, sql_ast::Expr::Nested(_))
    }

    fn convert(&self, expr: sql_ast::Expr, converter: &ExpressionConverter<'_>) -> Result<Predicate> {
        match expr {
            sql_ast::Expr::Nested(inner) => converter.convert(*inner),
            other => Err(RepoError::MalformedQuery(format!(
                "Expected a parenthesized expression, got: {}",
                other
            ))),
        }
    }
}
