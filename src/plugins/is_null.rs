use super::{ExpressionConverter, ExpressionPlugin};
use crate::core::{RepoError, Result};
use crate::query::Predicate;
use sqlparser::ast as sql_ast;

pub struct IsNullPlugin;

impl ExpressionPlugin for IsNullPlugin {
    fn name(&self) -> &'static str {
        "IS NULL"
    }

    fn can_handle(&self, expr: &sql_ast::Expr) -> bool {
        matches!(expr, sql_ast::Expr::IsNull(_) | sql_ast::Expr::IsNotNull(_))
    }

    fn convert(&self, expr: sql_ast::Expr, converter: &ExpressionConverter<'_>) -> Result<Predicate> {
        match expr {
            sql_ast::Expr::IsNull(e) => Ok(Predicate::IsNull {
                path: converter.path(&e)?,
                negated: false,
            }),
            sql_ast::Expr::IsNotNull(e) => Ok(Predicate::IsNull {
                path: converter.path(&e)?,
                negated: true,
            }),
            other => Err(RepoError::MalformedQuery(format!(
                "Expected IS [NOT] NULL, got: {}",
                other
            ))),
        }
    }
}
