use super::{ExpressionConverter, ExpressionPlugin};
use crate::core::{RepoError, Result};
use crate::query::Predicate;
use sqlparser::ast as sql_ast;

pub struct InListPlugin;

impl ExpressionPlugin for InListPlugin {
    fn name(&self) -> &'static str {
        "IN"
    }

    fn can_handle(&self, expr: &sql_ast::Expr) -> bool {
        matches!(expr, sql_ast::Expr::InList { .. })
    }

    fn convert(&self, expr: sql_ast::Expr, converter: &ExpressionConverter<'_>) -> Result<Predicate> {
        match expr {
            sql_ast::Expr::InList {
                expr,
                list,
                negated,
            } => {
                let values = list
                    .iter()
                    .map(|e| converter.value(e))
                    .collect::<Result<Vec<_>>>()?;

                Ok(Predicate::In {
                    path: converter.path(&expr)?,
                    values,
                    negated,
                })
            }
            other => Err(RepoError::MalformedQuery(format!(
                "Expected an IN list, got: {}",
                other
            ))),
        }
    }
}
