use super::predicate::{ComparisonOp, FieldPath, Predicate};
use crate::core::Value;
use crate::expression::escape_like;
use std::fmt;
use std::marker::PhantomData;

/// Typed reference to a property path of entity `E` holding values of type `T`.
///
/// ```ignore
/// const USERNAME: Field<Member, String> = Field::new("username");
/// let spec = USERNAME.equals("m1".to_string()).and(TEAM_NAME.equals("teamA".into()));
/// ```
pub struct Field<E, T> {
    path: &'static str,
    _marker: PhantomData<fn() -> (E, T)>,
}

impl<E, T> Clone for Field<E, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E, T> Copy for Field<E, T> {}

impl<E, T> fmt::Debug for Field<E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Field").field(&self.path).finish()
    }
}

impl<E, T> Field<E, T> {
    pub const fn new(path: &'static str) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> FieldPath {
        FieldPath::new(self.path)
    }

    pub fn is_null(&self) -> Specification<E> {
        Specification::from_predicate(Predicate::is_null(self.path))
    }

    pub fn is_not_null(&self) -> Specification<E> {
        Specification::from_predicate(Predicate::is_not_null(self.path))
    }
}

impl<E, T: Into<Value>> Field<E, T> {
    fn compare(&self, op: ComparisonOp, value: T) -> Specification<E> {
        Specification::from_predicate(Predicate::compare(self.path, op, value))
    }

    pub fn equals(&self, value: T) -> Specification<E> {
        self.compare(ComparisonOp::Eq, value)
    }

    pub fn not_equals(&self, value: T) -> Specification<E> {
        self.compare(ComparisonOp::NotEq, value)
    }

    pub fn greater_than(&self, value: T) -> Specification<E> {
        self.compare(ComparisonOp::Gt, value)
    }

    pub fn greater_than_or_equal(&self, value: T) -> Specification<E> {
        self.compare(ComparisonOp::GtEq, value)
    }

    pub fn less_than(&self, value: T) -> Specification<E> {
        self.compare(ComparisonOp::Lt, value)
    }

    pub fn less_than_or_equal(&self, value: T) -> Specification<E> {
        self.compare(ComparisonOp::LtEq, value)
    }

    /// Inclusive on both ends.
    pub fn between(&self, low: T, high: T) -> Specification<E> {
        self.greater_than_or_equal(low)
            .and(self.less_than_or_equal(high))
    }

    pub fn in_list(&self, values: impl IntoIterator<Item = T>) -> Specification<E> {
        Specification::from_predicate(Predicate::In {
            path: self.path(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        })
    }

    pub fn not_in(&self, values: impl IntoIterator<Item = T>) -> Specification<E> {
        Specification::from_predicate(Predicate::In {
            path: self.path(),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        })
    }
}

impl<E> Field<E, String> {
    /// SQL `LIKE` with `%` and `_` wildcards.
    pub fn like(&self, pattern: &str) -> Specification<E> {
        Specification::from_predicate(Predicate::compare(self.path, ComparisonOp::Like, pattern))
    }

    pub fn not_like(&self, pattern: &str) -> Specification<E> {
        Specification::from_predicate(Predicate::compare(
            self.path,
            ComparisonOp::NotLike,
            pattern,
        ))
    }

    pub fn contains(&self, fragment: &str) -> Specification<E> {
        self.like(&format!("%{}%", escape_like(fragment)))
    }

    pub fn starts_with(&self, prefix: &str) -> Specification<E> {
        self.like(&format!("{}%", escape_like(prefix)))
    }

    pub fn ends_with(&self, suffix: &str) -> Specification<E> {
        self.like(&format!("%{}", escape_like(suffix)))
    }
}

/// Composable predicate over entity type `E`, independent of any query method.
pub struct Specification<E> {
    predicate: Predicate,
    _marker: PhantomData<fn() -> E>,
}

impl<E> Clone for Specification<E> {
    fn clone(&self) -> Self {
        Self::from_predicate(self.predicate.clone())
    }
}

impl<E> fmt::Debug for Specification<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Specification({})", self.predicate)
    }
}

impl<E> PartialEq for Specification<E> {
    fn eq(&self, other: &Self) -> bool {
        self.predicate == other.predicate
    }
}

impl<E> Default for Specification<E> {
    fn default() -> Self {
        Self::all()
    }
}

impl<E> Specification<E> {
    /// Matches every row.
    pub fn all() -> Self {
        Self::from_predicate(Predicate::True)
    }

    pub fn from_predicate(predicate: Predicate) -> Self {
        Self {
            predicate,
            _marker: PhantomData,
        }
    }

    pub fn and(self, other: Specification<E>) -> Self {
        Self::from_predicate(self.predicate.and(other.predicate))
    }

    pub fn or(self, other: Specification<E>) -> Self {
        Self::from_predicate(self.predicate.or(other.predicate))
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn into_predicate(self) -> Predicate {
        self.predicate
    }
}

impl<E> std::ops::Not for Specification<E> {
    type Output = Specification<E>;

    fn not(self) -> Self::Output {
        Self::from_predicate(self.predicate.negate())
    }
}
