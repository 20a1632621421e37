pub mod description;
pub mod example;
pub mod method;
pub mod native;
pub mod predicate;
pub mod specification;

pub use description::{
    Assignment, Direction, LockMode, Order, QueryDescription, ResultShape, Sort, Window,
};
pub use example::{Example, ExampleMatcher, MatchMode, StringMatcher};
pub use method::{Arg, Clause, ClauseKind, DerivedQuery, MethodKind};
pub use native::{NativeQuery, Params, PreparedQuery};
pub use predicate::{ComparisonOp, FieldPath, Predicate};
pub use specification::{Field, Specification};
