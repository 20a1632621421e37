//! Native query subset of the in-memory executor.
//!
//! Supported: `SELECT` of `*`, `alias.*`, column references with optional
//! `AS`, or `count(*)`; one base table with joins `ON a.x = b.y`; `WHERE`
//! through the expression plugins; `ORDER BY`; `LIMIT`/`OFFSET`.

use super::memory::{Tables, table_of, window_rows};
use super::sort::{NullOrdering, SortExecutor, SortKey};
use super::table::Table;
use crate::core::{RepoError, Result, Row, Value};
use crate::evaluator::{EvaluationContext, EvaluatorRegistry, ValueSource};
use crate::mapping::MappingRegistry;
use crate::plugins::{ExpressionConverter, ExpressionPluginRegistry};
use crate::query::{FieldPath, PreparedQuery, Window};
use crate::result::ResultSet;
use sqlparser::ast as sql_ast;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::collections::HashSet;

fn malformed(msg: impl Into<String>) -> RepoError {
    RepoError::MalformedQuery(msg.into())
}

/// One table of the FROM clause.
struct Source<'a> {
    alias: String,
    table: &'a Table,
}

/// A joined row: one optional stored row per source.
type WideRow<'a> = Vec<Option<&'a Row>>;

struct Scope<'a> {
    sources: Vec<Source<'a>>,
}

impl<'a> Scope<'a> {
    /// Source index and column index of `alias.column` or an unambiguous `column`.
    fn locate(&self, path: &str) -> Result<(usize, usize)> {
        if let Some((alias, column)) = path.rsplit_once('.') {
            let idx = self
                .sources
                .iter()
                .position(|s| s.alias.eq_ignore_ascii_case(alias))
                .ok_or_else(|| malformed(format!("Unknown table alias '{}'", alias)))?;
            let col = self.sources[idx]
                .table
                .schema()
                .find_column_index(column)
                .ok_or_else(|| malformed(format!("Unknown column '{}'", path)))?;
            return Ok((idx, col));
        }

        let mut found = None;
        for (idx, source) in self.sources.iter().enumerate() {
            if let Some(col) = source.table.schema().find_column_index(path) {
                if found.is_some() {
                    return Err(malformed(format!("Column '{}' is ambiguous", path)));
                }
                found = Some((idx, col));
            }
        }
        found.ok_or_else(|| malformed(format!("Unknown column '{}'", path)))
    }

    fn value(&self, row: &WideRow<'_>, path: &str) -> Result<Value> {
        let (source, column) = self.locate(path)?;
        Ok(row
            .get(source)
            .copied()
            .flatten()
            .and_then(|r| r.get(column))
            .cloned()
            .unwrap_or(Value::Null))
    }
}

struct WideRowView<'s, 'a> {
    scope: &'s Scope<'a>,
    row: &'s WideRow<'a>,
}

impl ValueSource for WideRowView<'_, '_> {
    fn value(&self, path: &FieldPath) -> Result<Value> {
        self.scope.value(self.row, path.as_str())
    }
}

enum Output {
    Column { label: String, path: String },
    CountAll { label: String },
}

fn table_for<'a>(
    registry: &MappingRegistry,
    tables: &'a Tables,
    factor: &sql_ast::TableFactor,
) -> Result<Source<'a>> {
    let sql_ast::TableFactor::Table { name, alias, .. } = factor else {
        return Err(malformed(format!("Unsupported table reference: {}", factor)));
    };
    let table_name = name
        .0
        .last()
        .map(|part| part.to_string())
        .ok_or_else(|| malformed("Missing table name"))?;

    let entity = registry
        .entity_names()
        .find(|entity| {
            registry
                .get(entity)
                .is_ok_and(|m| m.table.eq_ignore_ascii_case(&table_name))
        })
        .ok_or_else(|| malformed(format!("Unknown table '{}'", table_name)))?;

    Ok(Source {
        alias: alias
            .as_ref()
            .map(|a| a.name.value.clone())
            .unwrap_or_else(|| table_name.clone()),
        table: table_of(tables, entity)?,
    })
}

fn join_constraint(operator: &sql_ast::JoinOperator) -> Result<(&sql_ast::Expr, bool)> {
    let (constraint, outer) = match operator {
        sql_ast::JoinOperator::Inner(c) | sql_ast::JoinOperator::Join(c) => (c, false),
        sql_ast::JoinOperator::Left(c) | sql_ast::JoinOperator::LeftOuter(c) => (c, true),
        other => return Err(malformed(format!("Unsupported join: {:?}", other))),
    };
    match constraint {
        sql_ast::JoinConstraint::On(expr) => Ok((expr, outer)),
        _ => Err(malformed("Joins need an ON condition")),
    }
}

fn join_columns(expr: &sql_ast::Expr, converter: &ExpressionConverter<'_>) -> Result<(String, String)> {
    match expr {
        sql_ast::Expr::Nested(inner) => join_columns(inner, converter),
        sql_ast::Expr::BinaryOp {
            left,
            op: sql_ast::BinaryOperator::Eq,
            right,
        } => Ok((
            converter.path(left)?.to_string(),
            converter.path(right)?.to_string(),
        )),
        other => Err(malformed(format!(
            "Join condition must compare two columns for equality: {}",
            other
        ))),
    }
}

fn is_count_all(expr: &sql_ast::Expr) -> Result<bool> {
    let sql_ast::Expr::Function(func) = expr else {
        return Ok(false);
    };
    if !func.name.to_string().eq_ignore_ascii_case("count") {
        return Err(malformed(format!("Unsupported function: {}", func.name)));
    }
    match &func.args {
        sql_ast::FunctionArguments::List(list)
            if list.args.len() == 1
                && matches!(
                    list.args[0],
                    sql_ast::FunctionArg::Unnamed(sql_ast::FunctionArgExpr::Wildcard)
                ) =>
        {
            Ok(true)
        }
        _ => Err(malformed(format!("Only count(*) is supported, got {}", expr))),
    }
}

fn outputs(
    select: &sql_ast::Select,
    scope: &Scope<'_>,
    converter: &ExpressionConverter<'_>,
) -> Result<Vec<Output>> {
    let mut outputs = Vec::new();
    let all_of = |source: &Source<'_>, outputs: &mut Vec<Output>| {
        for column in source.table.schema().columns() {
            outputs.push(Output::Column {
                label: column.name.clone(),
                path: format!("{}.{}", source.alias, column.name),
            });
        }
    };

    for item in &select.projection {
        match item {
            sql_ast::SelectItem::Wildcard(_) => {
                for source in &scope.sources {
                    all_of(source, &mut outputs);
                }
            }
            sql_ast::SelectItem::QualifiedWildcard(..) => {
                let text = item.to_string();
                let alias = text.strip_suffix(".*").unwrap_or(&text);
                let source = scope
                    .sources
                    .iter()
                    .find(|s| s.alias.eq_ignore_ascii_case(alias))
                    .ok_or_else(|| malformed(format!("Unknown table alias '{}'", alias)))?;
                all_of(source, &mut outputs);
            }
            sql_ast::SelectItem::UnnamedExpr(expr) => {
                if is_count_all(expr)? {
                    outputs.push(Output::CountAll {
                        label: "count".into(),
                    });
                } else {
                    let path = converter.path(expr)?.to_string();
                    let label = path.rsplit('.').next().unwrap_or(&path).to_string();
                    outputs.push(Output::Column { label, path });
                }
            }
            sql_ast::SelectItem::ExprWithAlias { expr, alias } => {
                if is_count_all(expr)? {
                    outputs.push(Output::CountAll {
                        label: alias.value.clone(),
                    });
                } else {
                    outputs.push(Output::Column {
                        label: alias.value.clone(),
                        path: converter.path(expr)?.to_string(),
                    });
                }
            }
        }
    }
    Ok(outputs)
}

fn limit_number(expr: &sql_ast::Expr, converter: &ExpressionConverter<'_>) -> Result<usize> {
    converter
        .value(expr)?
        .as_i64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| malformed(format!("LIMIT/OFFSET must be a non-negative integer: {}", expr)))
}

/// Runs one prepared `SELECT` and applies `window` after its own LIMIT/OFFSET.
pub(super) fn execute(
    registry: &MappingRegistry,
    tables: &Tables,
    plugins: &ExpressionPluginRegistry,
    evaluators: &EvaluatorRegistry,
    prepared: &PreparedQuery,
    window: Option<&Window>,
) -> Result<ResultSet> {
    let statements = Parser::parse_sql(&PostgreSqlDialect {}, &prepared.sql)
        .map_err(|e| malformed(format!("{} in: {}", e, prepared.sql)))?;
    let [sql_ast::Statement::Query(query)] = statements.as_slice() else {
        return Err(malformed(format!(
            "Expected a single SELECT statement: {}",
            prepared.sql
        )));
    };
    let sql_ast::SetExpr::Select(select) = query.body.as_ref() else {
        return Err(malformed("Only plain SELECT queries are supported"));
    };
    if select.having.is_some() {
        return Err(malformed("HAVING is not supported"));
    }
    let [from] = select.from.as_slice() else {
        return Err(malformed("Exactly one FROM table is required"));
    };

    let converter = ExpressionConverter::new(plugins, &prepared.values);
    let mut scope = Scope {
        sources: vec![table_for(registry, tables, &from.relation)?],
    };
    let mut rows: Vec<WideRow<'_>> = scope.sources[0]
        .table
        .scan()
        .map(|(_, row)| vec![Some(row)])
        .collect();

    for join in &from.joins {
        let source = table_for(registry, tables, &join.relation)?;
        let (on, outer) = join_constraint(&join.join_operator)?;
        let target = source.table;
        scope.sources.push(source);
        let (left, right) = join_columns(on, &converter)?;

        let mut joined = Vec::with_capacity(rows.len());
        for row in rows {
            let mut matched = false;
            for (_, candidate) in target.scan() {
                let mut wide = row.clone();
                wide.push(Some(candidate));
                let (a, b) = (scope.value(&wide, &left)?, scope.value(&wide, &right)?);
                if !a.is_null() && a == b {
                    matched = true;
                    joined.push(wide);
                }
            }
            if !matched && outer {
                let mut wide = row;
                wide.push(None);
                joined.push(wide);
            }
        }
        rows = joined;
    }

    if let Some(selection) = &select.selection {
        let predicate = converter.convert(selection.clone())?;
        let context = EvaluationContext::new(evaluators);
        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            let view = WideRowView {
                scope: &scope,
                row: &row,
            };
            if context.matches(&predicate, &view)? {
                kept.push(row);
            }
        }
        rows = kept;
    }

    let outputs = outputs(select, &scope, &converter)?;
    let columns: Vec<String> = outputs
        .iter()
        .map(|o| match o {
            Output::Column { label, .. } | Output::CountAll { label } => label.clone(),
        })
        .collect();

    if outputs.iter().any(|o| matches!(o, Output::CountAll { .. })) {
        if outputs.iter().any(|o| matches!(o, Output::Column { .. })) {
            return Err(malformed("count(*) cannot be mixed with plain columns"));
        }
        let count = Value::Integer(rows.len() as i64);
        return Ok(ResultSet::new(columns, vec![vec![count; outputs.len()]]));
    }

    if let Some(order_by) = &query.order_by {
        let sql_ast::OrderByKind::Expressions(exprs) = &order_by.kind else {
            return Err(malformed("ORDER BY ALL is not supported"));
        };
        let mut sort_keys = Vec::with_capacity(exprs.len());
        let mut paths = Vec::with_capacity(exprs.len());
        for order in exprs {
            let descending = order.options.asc.map(|asc| !asc).unwrap_or(false);
            let mut key = SortKey::new(descending);
            if let Some(nulls_first) = order.options.nulls_first {
                key.null_ordering = if nulls_first {
                    NullOrdering::NullsFirst
                } else {
                    NullOrdering::NullsLast
                };
            }
            sort_keys.push(key);
            paths.push(converter.path(&order.expr)?.to_string());
        }

        let mut keyed = Vec::with_capacity(rows.len());
        for row in rows {
            let values = paths
                .iter()
                .map(|p| scope.value(&row, p))
                .collect::<Result<Vec<_>>>()?;
            keyed.push((values, row));
        }
        SortExecutor::sort(&mut keyed, &sort_keys)?;
        rows = keyed.into_iter().map(|(_, row)| row).collect();
    }

    let mut result_rows = Vec::with_capacity(rows.len());
    for row in &rows {
        let values = outputs
            .iter()
            .filter_map(|o| match o {
                Output::Column { path, .. } => Some(scope.value(row, path)),
                Output::CountAll { .. } => None,
            })
            .collect::<Result<Row>>()?;
        result_rows.push(values);
    }

    if matches!(select.distinct, Some(sql_ast::Distinct::Distinct)) {
        let mut seen = HashSet::new();
        result_rows.retain(|row| seen.insert(row.clone()));
    }

    if let Some(limit) = &query.limit_clause {
        let (limit, offset) = match limit {
            sql_ast::LimitClause::LimitOffset { limit, offset, .. } => (
                limit.as_ref().map(|l| limit_number(l, &converter)).transpose()?,
                offset
                    .as_ref()
                    .map(|o| limit_number(&o.value, &converter))
                    .transpose()?,
            ),
            sql_ast::LimitClause::OffsetCommaLimit { offset, limit } => (
                Some(limit_number(limit, &converter)?),
                Some(limit_number(offset, &converter)?),
            ),
        };
        result_rows = result_rows
            .into_iter()
            .skip(offset.unwrap_or(0))
            .take(limit.unwrap_or(usize::MAX))
            .collect();
    }

    Ok(ResultSet::new(columns, window_rows(result_rows, window)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{NativeQuery, Params};
    use crate::sample;

    fn fixture() -> (MappingRegistry, Tables) {
        let registry = sample::mapping().unwrap();
        let mut tables = Tables::new();
        for name in ["Team", "Member"] {
            tables.insert(name.to_string(), Table::new(registry.get(name).unwrap()));
        }
        let teams = tables.get_mut("Team").unwrap();
        teams.insert(vec![Value::Null, "teamA".into()]).unwrap();
        teams.insert(vec![Value::Null, "teamB".into()]).unwrap();
        let members = tables.get_mut("Member").unwrap();
        for (name, age, team) in [("m1", 10, Some(1)), ("m2", 20, Some(2)), ("m3", 30, None::<i64>)] {
            members
                .insert(vec![Value::Null, name.into(), age.into(), team.into()])
                .unwrap();
        }
        (registry, tables)
    }

    fn run(sql: &str, params: Params, window: Option<Window>) -> Result<ResultSet> {
        let (registry, tables) = fixture();
        let prepared = NativeQuery::with_params(sql, params).prepare()?;
        execute(
            &registry,
            &tables,
            &ExpressionPluginRegistry::with_default_plugins(),
            &EvaluatorRegistry::with_default_evaluators(),
            &prepared,
            window.as_ref(),
        )
    }

    #[test]
    fn test_join_with_named_parameter() {
        let result = run(
            "select m.username, t.name as team_name from member m join team t on m.team_id = t.id \
             where t.name = :team order by m.username",
            Params::new().named("team", "teamB"),
            None,
        )
        .unwrap();
        assert_eq!(result.columns, vec!["username", "team_name"]);
        assert_eq!(
            result.rows,
            vec![vec![Value::from("m2"), Value::from("teamB")]]
        );
    }

    #[test]
    fn test_left_join_keeps_unmatched_rows() {
        let result = run(
            "select count(*) from member m left join team t on m.team_id = t.id",
            Params::new(),
            None,
        )
        .unwrap();
        assert_eq!(result.scalar().unwrap(), &Value::Integer(3));
    }

    #[test]
    fn test_window_after_limit() {
        let result = run(
            "select m.* from member m where age >= ?1 order by age desc limit 2",
            Params::positional([10]),
            Some(Window::OffsetLimit { offset: 1, limit: 5 }),
        )
        .unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.records()[0].get("username"), Some(&Value::from("m2")));
    }

    #[test]
    fn test_malformed_and_unknown_table() {
        assert!(matches!(
            run("selec * from member", Params::new(), None),
            Err(RepoError::MalformedQuery(_))
        ));
        assert!(matches!(
            run("select * from players", Params::new(), None),
            Err(RepoError::MalformedQuery(_))
        ));
        let empty = run(
            "select * from member where username = 'nobody'",
            Params::new(),
            None,
        )
        .unwrap();
        assert!(empty.is_empty());
    }
}
