//! The query executor seam and the in-memory reference executor.

pub mod change;
pub mod locks;
mod memory;
mod native;
pub mod sort;
pub mod table;

pub use memory::{ExecutorStats, InMemoryExecutor};

use crate::core::{Key, Result, Row};
use crate::query::{Assignment, NativeQuery, QueryDescription, Window};
use crate::result::ResultSet;
use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

/// Identifies the unit of work a statement runs for.
pub type SessionId = Uuid;

/// Runs query descriptions and writes against storage.
///
/// Rows exchanged with `insert` and `update` are in the entity's storage
/// column order (see [`EntityMapping::storage_columns`](crate::mapping::EntityMapping::storage_columns)).
/// Malformed statements fail with `MalformedQuery`; no rows is an empty
/// result, never an error.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn begin(&self, session: SessionId, lock_timeout: Duration) -> Result<()>;

    async fn fetch(&self, session: SessionId, query: &QueryDescription) -> Result<ResultSet>;

    /// Number of rows `query` matches, ignoring its window and row cap.
    async fn count(&self, session: SessionId, query: &QueryDescription) -> Result<u64>;

    /// Inserts a row and returns its key.
    async fn insert(&self, session: SessionId, entity: &str, row: Row) -> Result<Key>;

    /// Replaces a row; `false` when no row has that key.
    async fn update(&self, session: SessionId, entity: &str, key: Key, row: Row) -> Result<bool>;

    async fn delete(&self, session: SessionId, entity: &str, key: Key) -> Result<bool>;

    async fn bulk_update(
        &self,
        session: SessionId,
        query: &QueryDescription,
        assignments: &[Assignment],
    ) -> Result<u64>;

    async fn bulk_delete(&self, session: SessionId, query: &QueryDescription) -> Result<u64>;

    async fn native(
        &self,
        session: SessionId,
        query: &NativeQuery,
        window: Option<Window>,
    ) -> Result<ResultSet>;

    async fn commit(&self, session: SessionId) -> Result<()>;

    async fn rollback(&self, session: SessionId) -> Result<()>;

    async fn release_locks(&self, session: SessionId) -> Result<usize>;
}
