use super::{ExpressionConverter, ExpressionPlugin};
use crate::core::{RepoError, Result};
use crate::query::{ComparisonOp, Predicate};
use sqlparser::ast as sql_ast;

pub struct LikePlugin;

impl ExpressionPlugin for LikePlugin {
    fn name(&self) -> &'static str {
        "LIKE"
    }

    fn can_handle(&self, expr: &sql_ast::Expr) -> bool {
        matches!(expr, sql_ast::Expr::Like { .. })
    }

    fn convert(&self, expr: sql_ast::Expr, converter: &ExpressionConverter<'_>) -> Result<Predicate> {
        match expr {
            sql_ast::Expr::Like {
                negated,
                expr,
                pattern,
                escape_char,
                ..
            } => {
                if escape_char.is_some() {
                    return Err(RepoError::MalformedQuery(
                        "LIKE ESCAPE is not supported".into(),
                    ));
                }

                let op = if negated {
                    ComparisonOp::NotLike
                } else {
                    ComparisonOp::Like
                };
                Ok(Predicate::compare(
                    converter.path(&expr)?,
                    op,
                    converter.value(&pattern)?,
                ))
            }
            other => Err(RepoError::MalformedQuery(format!(
                "Expected LIKE, got: {}",
                other
            ))),
        }
    }
}
