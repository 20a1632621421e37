use crate::core::{RepoError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single column value as it travels between storage, records and views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// Orders two non-null values. Integers and floats compare numerically;
    /// any other pairing of different kinds, or a null operand, is a
    /// `TypeMismatch`. Null placement is the caller's decision.
    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        let ordering = match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Boolean(a), Self::Boolean(b)) => Some(a.cmp(b)),
            (Self::Timestamp(a), Self::Timestamp(b)) => Some(a.cmp(b)),
            (left, right) => match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => Some(a.total_cmp(&b)),
                _ => None,
            },
        };
        ordering.ok_or_else(|| {
            RepoError::TypeMismatch(format!(
                "Cannot order {} against {}",
                self.type_name(),
                other.type_name()
            ))
        })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Integer(_) => "INTEGER",
            Self::Float(_) => "FLOAT",
            Self::Text(_) => "TEXT",
            Self::Boolean(_) => "BOOLEAN",
            Self::Timestamp(_) => "TIMESTAMP",
        }
    }

    /// Integral view of a number. Floats qualify only when they carry no fraction.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Adds an integer delta for increment assignments. Null stays null.
    pub fn checked_add(&self, delta: i64) -> Result<Value> {
        match self {
            Self::Null => Ok(Self::Null),
            Self::Integer(i) => i.checked_add(delta).map(Self::Integer).ok_or_else(|| {
                RepoError::Execution(format!("Integer overflow adding {} to {}", delta, i))
            }),
            Self::Float(f) => Ok(Self::Float(f + delta as f64)),
            other => Err(RepoError::TypeMismatch(format!(
                "Cannot increment a {} column",
                other.type_name()
            ))),
        }
    }
}

/// Structural equality used by change detection and tests. Unlike predicate
/// evaluation, `Null == Null` holds here.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Null, _) | (_, Self::Null) => false,
            _ => matches!(self.compare(other), Ok(Ordering::Equal)),
        }
    }
}

impl Eq for Value {}

/// Numbers hash by their `f64` bits so that `Integer(2)` and `Float(2.0)`,
/// which compare equal, land in the same bucket.
impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Null => 0u8.hash(state),
            Self::Integer(i) => (1u8, (*i as f64).to_bits()).hash(state),
            Self::Float(f) => (1u8, f.to_bits()).hash(state),
            Self::Text(s) => (2u8, s).hash(state),
            Self::Boolean(b) => (3u8, b).hash(state),
            Self::Timestamp(ts) => (4u8, ts).hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => f.write_str(s),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Timestamp(ts) => f.write_str(&ts.to_rfc3339()),
        }
    }
}

macro_rules! value_from {
    ($($source:ty => $variant:ident $(as $target:ty)?),* $(,)?) => {
        $(
            impl From<$source> for Value {
                fn from(v: $source) -> Self {
                    Self::$variant(v $(as $target)?)
                }
            }
        )*
    };
}

value_from! {
    i64 => Integer,
    i32 => Integer as i64,
    u32 => Integer as i64,
    f64 => Float,
    bool => Boolean,
    String => Text,
    DateTime<Utc> => Timestamp,
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Declared column type in an entity mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Float,
    Text,
    Boolean,
    Timestamp,
}

impl DataType {
    /// Whether `value` may be stored in a column of this type. Null always fits;
    /// not-null is checked separately by the mapping.
    pub fn accepts(&self, value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::Integer(_) => matches!(self, Self::Integer | Self::Float),
            Value::Float(_) => *self == Self::Float,
            Value::Text(_) => *self == Self::Text,
            Value::Boolean(_) => *self == Self::Boolean,
            Value::Timestamp(_) => *self == Self::Timestamp,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
            Self::Text => "TEXT",
            Self::Boolean => "BOOLEAN",
            Self::Timestamp => "TIMESTAMP",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_compare_across_kinds() {
        assert_eq!(Value::Integer(2), Value::Float(2.0));
        assert_eq!(
            Value::Integer(1).compare(&Value::Float(1.5)).unwrap(),
            Ordering::Less
        );
        assert_ne!(Value::Integer(1), Value::Integer(2));
    }

    #[test]
    fn test_null_and_mixed_kinds_do_not_order() {
        assert!(Value::Null.compare(&Value::Integer(1)).is_err());
        assert!(Value::Text("a".into()).compare(&Value::Integer(1)).is_err());
        assert_eq!(Value::Null, Value::Null);
        assert_ne!(Value::Null, Value::Integer(0));
    }

    #[test]
    fn test_equal_numbers_hash_alike() {
        use std::collections::HashSet;
        let set: HashSet<Value> = [Value::Integer(2), Value::Float(2.0), Value::Null, Value::Null]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_column_type_acceptance() {
        assert!(DataType::Integer.accepts(&Value::Integer(42)));
        assert!(DataType::Integer.accepts(&Value::Null));
        assert!(DataType::Float.accepts(&Value::Integer(1)));
        assert!(!DataType::Integer.accepts(&Value::Text("hello".into())));
    }

    #[test]
    fn test_checked_add() {
        assert_eq!(Value::Integer(20).checked_add(1).unwrap(), Value::Integer(21));
        assert!(Value::Null.checked_add(1).unwrap().is_null());
        assert!(Value::Integer(i64::MAX).checked_add(1).is_err());
        assert!(Value::Text("x".into()).checked_add(1).is_err());
    }

    #[test]
    fn test_integral_floats_convert() {
        assert_eq!(Value::Float(3.0).as_i64(), Some(3));
        assert_eq!(Value::Float(3.5).as_i64(), None);
        assert!(Value::from(None::<i64>).is_null());
        assert_eq!(Value::from(Some("a")), Value::Text("a".into()));
    }
}
