use crate::core::{RepoError, Result, Value};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::collections::HashMap;

/// Values bound to a native query's `?`, `?N` and `:name` placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    positional: Vec<Value>,
    named: HashMap<String, Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn positional<T: Into<Value>>(values: impl IntoIterator<Item = T>) -> Self {
        Self {
            positional: values.into_iter().map(Into::into).collect(),
            named: HashMap::new(),
        }
    }

    /// Appends the next positional value.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Placeholder {
    /// 1-based position.
    Index(usize),
    Named(String),
}

/// Free-form query text plus its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeQuery {
    sql: String,
    params: Params,
}

/// Query text with every placeholder rewritten to `$N`, and the values in `$N` order.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedQuery {
    pub sql: String,
    pub values: Vec<Value>,
}

impl NativeQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self::with_params(sql, Params::new())
    }

    pub fn with_params(sql: impl Into<String>, params: Params) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn prepare(&self) -> Result<PreparedQuery> {
        let (sql, placeholders) = rewrite_placeholders(&self.sql)?;
        let mut values = Vec::with_capacity(placeholders.len());
        for placeholder in placeholders {
            let value = match &placeholder {
                Placeholder::Index(idx) => self.params.positional.get(idx - 1),
                Placeholder::Named(name) => self.params.named.get(name),
            };
            let value = value.cloned().ok_or_else(|| {
                RepoError::Configuration(format!(
                    "No value bound for parameter {} in query: {}",
                    match &placeholder {
                        Placeholder::Index(idx) => format!("?{}", idx),
                        Placeholder::Named(name) => format!(":{}", name),
                    },
                    self.sql
                ))
            })?;
            values.push(value);
        }
        Ok(PreparedQuery { sql, values })
    }
}

/// Checks that `sql` is a single parseable statement.
pub fn validate_syntax(sql: &str) -> Result<()> {
    let (rewritten, _) = rewrite_placeholders(sql)?;
    let statements = Parser::parse_sql(&PostgreSqlDialect {}, &rewritten)
        .map_err(|e| RepoError::MalformedQuery(format!("{} in: {}", e, sql)))?;
    if statements.len() != 1 {
        return Err(RepoError::MalformedQuery(format!(
            "Expected exactly one statement, got {}: {}",
            statements.len(),
            sql
        )));
    }
    Ok(())
}

fn slot_for(placeholder: Placeholder, slots: &mut Vec<Placeholder>) -> usize {
    if let Some(pos) = slots.iter().position(|p| *p == placeholder) {
        return pos + 1;
    }
    slots.push(placeholder);
    slots.len()
}

/// Rewrites `?`, `?N` and `:name` outside string literals into `$1..$n`.
/// Repeated placeholders share one slot; `::` casts are left alone.
fn rewrite_placeholders(sql: &str) -> Result<(String, Vec<Placeholder>)> {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len() + 8);
    let mut slots: Vec<Placeholder> = Vec::new();
    let mut next_sequential = 1usize;
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            in_string = !in_string;
            out.push(c);
            i += 1;
            continue;
        }
        if in_string {
            out.push(c);
            i += 1;
            continue;
        }

        match c {
            '?' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end].is_ascii_digit() {
                    end += 1;
                }
                let placeholder = if end > start {
                    let digits: String = chars[start..end].iter().collect();
                    let idx = digits.parse::<usize>().map_err(|_| {
                        RepoError::MalformedQuery(format!("Invalid parameter index ?{}", digits))
                    })?;
                    if idx == 0 {
                        return Err(RepoError::MalformedQuery(
                            "Parameter indexes start at ?1".into(),
                        ));
                    }
                    Placeholder::Index(idx)
                } else {
                    let idx = next_sequential;
                    next_sequential += 1;
                    Placeholder::Index(idx)
                };
                let slot = slot_for(placeholder, &mut slots);
                out.push_str(&format!("${}", slot));
                i = end;
            }
            ':' if i + 1 < chars.len()
                && (chars[i + 1].is_ascii_alphabetic() || chars[i + 1] == '_')
                && (i == 0 || chars[i - 1] != ':') =>
            {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_')
                {
                    end += 1;
                }
                let name: String = chars[start..end].iter().collect();
                let slot = slot_for(Placeholder::Named(name), &mut slots);
                out.push_str(&format!("${}", slot));
                i = end;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    if in_string {
        return Err(RepoError::MalformedQuery(format!(
            "Unterminated string literal in: {}",
            sql
        )));
    }
    Ok((out, slots))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_mixed_placeholders() {
        let query = NativeQuery::with_params(
            "select * from member where username = :name and age > ? or username = :name",
            Params::new().named("name", "m1").arg(10),
        );
        let prepared = query.prepare().unwrap();
        assert_eq!(
            prepared.sql,
            "select * from member where username = $1 and age > $2 or username = $1"
        );
        assert_eq!(
            prepared.values,
            vec![Value::Text("m1".into()), Value::Integer(10)]
        );
    }

    #[test]
    fn test_indexed_placeholders_and_literals_untouched() {
        let query = NativeQuery::with_params(
            "select * from member where username = ?1 and note = 'a?b:c' and age = ?1",
            Params::positional(["m1"]),
        );
        let prepared = query.prepare().unwrap();
        assert_eq!(
            prepared.sql,
            "select * from member where username = $1 and note = 'a?b:c' and age = $1"
        );
        assert_eq!(prepared.values.len(), 1);
    }

    #[test]
    fn test_missing_parameter() {
        let err = NativeQuery::new("select * from member where username = ?")
            .prepare()
            .unwrap_err();
        assert!(matches!(err, RepoError::Configuration(_)));
    }

    #[test]
    fn test_validate_syntax() {
        assert!(validate_syntax("select * from member where username = ?").is_ok());
        assert!(matches!(
            validate_syntax("selec * form member"),
            Err(RepoError::MalformedQuery(_))
        ));
    }
}
