// ============================================================================
// memorepo Library
// ============================================================================

pub mod config;
pub mod core;
pub mod entity;
pub mod executor;
pub mod mapping;
pub mod materialize;
pub mod paging;
pub mod projection;
pub mod query;
pub mod repository;
pub mod result;
pub mod sample;
pub mod session;
pub mod store;
mod evaluator;
mod expression;
mod plugins;

// Re-export main types for convenience
pub use config::{FlushMode, NestedFetch, RepositoryConfig};
pub use core::{DataType, Key, Record, RepoError, Result, Value};
pub use entity::{Entity, FromValue};
pub use executor::{InMemoryExecutor, QueryExecutor};
pub use mapping::{EntityMapping, FetchType, MappingRegistry};
pub use materialize::FromColumns;
pub use paging::{Page, PageRequest, Slice};
pub use projection::{ClosedView, Projection, ProjectionSpec};
pub use query::{
    Arg, Assignment, Example, ExampleMatcher, LockMode, NativeQuery, Params, Predicate,
    QueryDescription, Sort, Specification,
};
pub use repository::{MethodOptions, Repository, RepositoryBuilder};
pub use result::ResultSet;
pub use session::{EntityRef, FetchPlan, Lazy, LazyList, LoadContext, UnitOfWork};
pub use store::Store;
