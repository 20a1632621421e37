//! Conversion of native query `WHERE` expressions into [`Predicate`] trees.
//!
//! Each supported SQL construct has its own plugin; the converter handles
//! identifiers, literals and placeholders itself and dispatches the rest.

pub mod boolean;
pub mod comparison;
pub mod in_list;
pub mod is_null;
pub mod like;
pub mod nested;

use crate::core::{RepoError, Result, Value};
use crate::query::{FieldPath, Predicate};
use sqlparser::ast as sql_ast;

pub trait ExpressionPlugin: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_handle(&self, expr: &sql_ast::Expr) -> bool;

    fn convert(&self, expr: sql_ast::Expr, converter: &ExpressionConverter<'_>) -> Result<Predicate>;
}

pub struct ExpressionPluginRegistry {
    plugins: Vec<Box<dyn ExpressionPlugin>>,
}

impl ExpressionPluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    pub fn register(&mut self, plugin: Box<dyn ExpressionPlugin>) {
        log::trace!("Registered expression plugin: {}", plugin.name());
        self.plugins.push(plugin);
    }

    pub fn with_default_plugins() -> Self {
        let mut registry = Self::new();

        // Nested first so parentheses unwrap before anything else looks at them
        registry.register(Box::new(nested::NestedPlugin));
        registry.register(Box::new(like::LikePlugin));
        registry.register(Box::new(is_null::IsNullPlugin));
        registry.register(Box::new(comparison::ComparisonPlugin));
        registry.register(Box::new(in_list::InListPlugin));
        registry.register(Box::new(boolean::BooleanPlugin));

        registry
    }

    pub fn find_plugin(&self, expr: &sql_ast::Expr) -> Option<&dyn ExpressionPlugin> {
        self.plugins
            .iter()
            .find(|plugin| plugin.can_handle(expr))
            .map(|boxed| &**boxed)
    }
}

impl Default for ExpressionPluginRegistry {
    fn default() -> Self {
        Self::with_default_plugins()
    }
}

/// Either side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Path(FieldPath),
    Value(Value),
}

/// Converts one statement's expressions; `$N` placeholders read from `params`.
pub struct ExpressionConverter<'a> {
    registry: &'a ExpressionPluginRegistry,
    params: &'a [Value],
}

impl<'a> ExpressionConverter<'a> {
    pub fn new(registry: &'a ExpressionPluginRegistry, params: &'a [Value]) -> Self {
        Self { registry, params }
    }

    /// Converts a boolean condition.
    pub fn convert(&self, expr: sql_ast::Expr) -> Result<Predicate> {
        if let sql_ast::Expr::Value(val) = &expr
            && let sql_ast::Value::Boolean(b) = &val.value
        {
            return Ok(if *b {
                Predicate::True
            } else {
                Predicate::True.negate()
            });
        }

        if let Some(plugin) = self.registry.find_plugin(&expr) {
            return plugin.convert(expr, self);
        }

        Err(RepoError::MalformedQuery(format!(
            "Unsupported condition in native query: {}",
            expr
        )))
    }

    pub fn operand(&self, expr: &sql_ast::Expr) -> Result<Operand> {
        match expr {
            sql_ast::Expr::Identifier(ident) => Ok(Operand::Path(FieldPath::new(ident.value.clone()))),
            sql_ast::Expr::CompoundIdentifier(idents) => {
                let parts: Vec<&str> = idents.iter().map(|i| i.value.as_str()).collect();
                Ok(Operand::Path(FieldPath::new(parts.join("."))))
            }
            sql_ast::Expr::Nested(inner) => self.operand(inner),
            _ => self.value(expr).map(Operand::Value),
        }
    }

    pub fn path(&self, expr: &sql_ast::Expr) -> Result<FieldPath> {
        match self.operand(expr)? {
            Operand::Path(path) => Ok(path),
            Operand::Value(value) => Err(RepoError::MalformedQuery(format!(
                "Expected a column reference, got literal {}",
                value
            ))),
        }
    }

    pub fn value(&self, expr: &sql_ast::Expr) -> Result<Value> {
        match expr {
            sql_ast::Expr::Value(val) => self.convert_value(&val.value),
            sql_ast::Expr::UnaryOp {
                op: sql_ast::UnaryOperator::Minus,
                expr,
            } => match self.value(expr)? {
                Value::Integer(i) => Ok(Value::Integer(-i)),
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(RepoError::TypeMismatch(format!(
                    "Cannot negate {}",
                    other.type_name()
                ))),
            },
            sql_ast::Expr::Nested(inner) => self.value(inner),
            _ => Err(RepoError::MalformedQuery(format!(
                "Expected a literal or parameter, got: {}",
                expr
            ))),
        }
    }

    pub fn convert_value(&self, val: &sql_ast::Value) -> Result<Value> {
        match val {
            sql_ast::Value::Number(n, _) => {
                if let Ok(i) = n.parse::<i64>() {
                    Ok(Value::Integer(i))
                } else if let Ok(f) = n.parse::<f64>() {
                    Ok(Value::Float(f))
                } else {
                    Err(RepoError::TypeMismatch(format!("Invalid number: {}", n)))
                }
            }
            sql_ast::Value::SingleQuotedString(s) | sql_ast::Value::DoubleQuotedString(s) => {
                Ok(Value::Text(s.clone()))
            }
            sql_ast::Value::Boolean(b) => Ok(Value::Boolean(*b)),
            sql_ast::Value::Null => Ok(Value::Null),
            sql_ast::Value::Placeholder(p) => {
                let idx = p
                    .strip_prefix('$')
                    .and_then(|n| n.parse::<usize>().ok())
                    .filter(|n| *n >= 1)
                    .ok_or_else(|| {
                        RepoError::MalformedQuery(format!("Unsupported placeholder '{}'", p))
                    })?;
                self.params.get(idx - 1).cloned().ok_or_else(|| {
                    RepoError::Configuration(format!("No value bound for parameter {}", p))
                })
            }
            _ => Err(RepoError::MalformedQuery(format!(
                "Unsupported value: {}",
                val
            ))),
        }
    }
}
