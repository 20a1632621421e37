use crate::core::Value;
use std::fmt;

/// Dotted property path from a query's root entity, e.g. `team.name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath(String);

impl FieldPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    pub fn is_nested(&self) -> bool {
        self.0.contains('.')
    }

    /// `team.name` -> `team`
    pub fn head(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }

    /// Path relative to the first segment: `team.name` -> `name`.
    pub fn tail(&self) -> Option<FieldPath> {
        self.0
            .split_once('.')
            .map(|(_, rest)| FieldPath::new(rest))
    }

    pub fn child(&self, segment: &str) -> FieldPath {
        FieldPath(format!("{}.{}", self.0, segment))
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for FieldPath {
    fn from(path: String) -> Self {
        Self(path)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
    NotLike,
}

impl ComparisonOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
        }
    }
}

/// Boolean condition tree over field paths.
///
/// Building never evaluates anything; executors consume the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// No restriction.
    True,
    Comparison {
        path: FieldPath,
        op: ComparisonOp,
        value: Value,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    IsNull {
        path: FieldPath,
        negated: bool,
    },
    In {
        path: FieldPath,
        values: Vec<Value>,
        negated: bool,
    },
}

impl Default for Predicate {
    fn default() -> Self {
        Self::True
    }
}

impl Predicate {
    pub fn compare(path: impl Into<FieldPath>, op: ComparisonOp, value: impl Into<Value>) -> Self {
        Self::Comparison {
            path: path.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(path: impl Into<FieldPath>, value: impl Into<Value>) -> Self {
        Self::compare(path, ComparisonOp::Eq, value)
    }

    pub fn is_null(path: impl Into<FieldPath>) -> Self {
        Self::IsNull {
            path: path.into(),
            negated: false,
        }
    }

    pub fn is_not_null(path: impl Into<FieldPath>) -> Self {
        Self::IsNull {
            path: path.into(),
            negated: true,
        }
    }

    pub fn in_list(path: impl Into<FieldPath>, values: Vec<Value>) -> Self {
        Self::In {
            path: path.into(),
            values,
            negated: false,
        }
    }

    /// Conjunction; flattens nested ANDs and drops `True` operands.
    pub fn and(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::True, p) | (p, Predicate::True) => p,
            (Predicate::And(mut left), Predicate::And(right)) => {
                left.extend(right);
                Predicate::And(left)
            }
            (Predicate::And(mut left), p) => {
                left.push(p);
                Predicate::And(left)
            }
            (p, Predicate::And(mut right)) => {
                right.insert(0, p);
                Predicate::And(right)
            }
            (left, right) => Predicate::And(vec![left, right]),
        }
    }

    /// Disjunction; flattens nested ORs. `True` absorbs the other operand.
    pub fn or(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::True, _) | (_, Predicate::True) => Predicate::True,
            (Predicate::Or(mut left), Predicate::Or(right)) => {
                left.extend(right);
                Predicate::Or(left)
            }
            (Predicate::Or(mut left), p) => {
                left.push(p);
                Predicate::Or(left)
            }
            (p, Predicate::Or(mut right)) => {
                right.insert(0, p);
                Predicate::Or(right)
            }
            (left, right) => Predicate::Or(vec![left, right]),
        }
    }

    pub fn negate(self) -> Predicate {
        match self {
            Predicate::Not(inner) => *inner,
            other => Predicate::Not(Box::new(other)),
        }
    }

    pub fn all(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
        predicates
            .into_iter()
            .fold(Predicate::True, |acc, p| acc.and(p))
    }

    pub fn any(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
        let mut iter = predicates.into_iter();
        match iter.next() {
            None => Predicate::True,
            Some(first) => iter.fold(first, |acc, p| acc.or(p)),
        }
    }

    pub fn is_trivial(&self) -> bool {
        matches!(self, Predicate::True)
    }

    /// Every field path referenced by the tree, in visit order.
    pub fn paths(&self) -> Vec<&FieldPath> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a FieldPath>) {
        match self {
            Predicate::True => {}
            Predicate::Comparison { path, .. }
            | Predicate::IsNull { path, .. }
            | Predicate::In { path, .. } => out.push(path),
            Predicate::And(items) | Predicate::Or(items) => {
                items.iter().for_each(|p| p.collect_paths(out))
            }
            Predicate::Not(inner) => inner.collect_paths(out),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn literal(value: &Value) -> String {
            match value {
                Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
                other => other.to_string(),
            }
        }

        match self {
            Predicate::True => write!(f, "TRUE"),
            Predicate::Comparison { path, op, value } => {
                write!(f, "{} {} {}", path, op.symbol(), literal(value))
            }
            Predicate::And(items) | Predicate::Or(items) => {
                let joiner = if matches!(self, Predicate::And(_)) {
                    " AND "
                } else {
                    " OR "
                };
                let parts: Vec<String> = items.iter().map(|p| p.to_string()).collect();
                write!(f, "({})", parts.join(joiner))
            }
            Predicate::Not(inner) => write!(f, "NOT {}", inner),
            Predicate::IsNull { path, negated } => {
                write!(f, "{} IS {}NULL", path, if *negated { "NOT " } else { "" })
            }
            Predicate::In {
                path,
                values,
                negated,
            } => {
                let parts: Vec<String> = values.iter().map(literal).collect();
                write!(
                    f,
                    "{} {}IN ({})",
                    path,
                    if *negated { "NOT " } else { "" },
                    parts.join(", ")
                )
            }
        }
    }
}
