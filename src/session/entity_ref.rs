use crate::core::{Key, Record, RepoError, Result};
use crate::entity::Entity;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Shared state behind an [`EntityRef`].
pub struct EntityCell<E> {
    key: OnceLock<Key>,
    data: RwLock<E>,
    snapshot: Mutex<Option<Record>>,
    read_only: AtomicBool,
    removed: AtomicBool,
}

impl<E: Entity> EntityCell<E> {
    fn new(entity: E) -> Self {
        let key = OnceLock::new();
        if let Some(k) = entity.key() {
            let _ = key.set(k);
        }
        Self {
            key,
            data: RwLock::new(entity),
            snapshot: Mutex::new(None),
            read_only: AtomicBool::new(false),
            removed: AtomicBool::new(false),
        }
    }
}

/// Type-erased view of a managed entity used by the identity map and flush.
pub(crate) trait ManagedEntry: Send + Sync {
    fn entity_name(&self) -> &'static str;

    fn key(&self) -> Option<Key>;

    fn current_record(&self) -> Result<Record>;

    fn snapshot(&self) -> Result<Option<Record>>;

    fn set_snapshot(&self, record: Option<Record>) -> Result<()>;

    fn is_read_only(&self) -> bool;

    fn is_removed(&self) -> bool;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<E: Entity> ManagedEntry for EntityCell<E> {
    fn entity_name(&self) -> &'static str {
        E::NAME
    }

    fn key(&self) -> Option<Key> {
        self.key.get().copied()
    }

    fn current_record(&self) -> Result<Record> {
        Ok(self.data.read()?.to_record())
    }

    fn snapshot(&self) -> Result<Option<Record>> {
        Ok(self.snapshot.lock()?.clone())
    }

    fn set_snapshot(&self, record: Option<Record>) -> Result<()> {
        *self.snapshot.lock()? = record;
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Acquire)
    }

    fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Handle to an entity instance.
///
/// Clones share the instance. Within one unit of work every load of the same
/// key yields a handle to the same instance, see [`EntityRef::same_instance`].
pub struct EntityRef<E> {
    cell: Arc<EntityCell<E>>,
}

impl<E> Clone for EntityRef<E> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<E: Entity> fmt::Debug for EntityRef<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityRef<{}>({:?})", E::NAME, self.key())
    }
}

impl<E: Entity> EntityRef<E> {
    /// Wraps an instance that no unit of work manages yet.
    pub fn new(entity: E) -> Self {
        Self {
            cell: Arc::new(EntityCell::new(entity)),
        }
    }

    pub(crate) fn from_cell(cell: Arc<EntityCell<E>>) -> Self {
        Self { cell }
    }

    pub(crate) fn cell(&self) -> &Arc<EntityCell<E>> {
        &self.cell
    }

    pub(crate) fn entry(&self) -> Arc<dyn ManagedEntry> {
        Arc::clone(&self.cell) as Arc<dyn ManagedEntry>
    }

    pub fn key(&self) -> Option<Key> {
        self.cell.key.get().copied()
    }

    pub fn read(&self) -> Result<RwLockReadGuard<'_, E>> {
        Ok(self.cell.data.read()?)
    }

    pub fn write(&self) -> Result<RwLockWriteGuard<'_, E>> {
        if self.cell.read_only.load(Ordering::Acquire) {
            log::debug!(
                "Modifying read-only {}#{:?}; the change will not be flushed",
                E::NAME,
                self.key()
            );
        }
        Ok(self.cell.data.write()?)
    }

    /// Whether both handles point at the very same in-memory instance.
    pub fn same_instance(&self, other: &EntityRef<E>) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    pub fn is_read_only(&self) -> bool {
        self.cell.read_only.load(Ordering::Acquire)
    }

    pub fn is_removed(&self) -> bool {
        self.cell.removed.load(Ordering::Acquire)
    }

    /// Current state as a record.
    pub fn record(&self) -> Result<Record> {
        Ok(self.read()?.to_record())
    }

    /// Records the key assigned at insert on both the handle and the entity.
    pub(crate) fn assign_key(&self, key: Key) -> Result<()> {
        if let Some(existing) = self.key()
            && existing != key
        {
            return Err(RepoError::ConstraintViolation(format!(
                "{} already has key {}, cannot assign {}",
                E::NAME,
                existing,
                key
            )));
        }
        self.cell.data.write()?.set_key(key);
        let _ = self.cell.key.set(key);
        Ok(())
    }

    pub(crate) fn replace(&self, entity: E) -> Result<()> {
        *self.cell.data.write()? = entity;
        Ok(())
    }

    pub(crate) fn set_read_only(&self, read_only: bool) {
        self.cell.read_only.store(read_only, Ordering::Release);
    }

    pub(crate) fn set_removed(&self, removed: bool) {
        self.cell.removed.store(removed, Ordering::Release);
    }

    pub(crate) fn take_snapshot(&self) -> Result<()> {
        let record = self.record()?;
        *self.cell.snapshot.lock()? = Some(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Team;

    #[test]
    fn test_clones_share_the_instance() {
        let team = EntityRef::new(Team::new("teamA"));
        let alias = team.clone();
        alias.write().unwrap().name = "teamB".into();
        assert_eq!(team.read().unwrap().name, "teamB");
        assert!(team.same_instance(&alias));
        assert!(!team.same_instance(&EntityRef::new(Team::new("teamB"))));
    }

    #[test]
    fn test_assign_key_once() {
        let team = EntityRef::new(Team::new("teamA"));
        assert_eq!(team.key(), None);
        team.assign_key(7).unwrap();
        assert_eq!(team.key(), Some(7));
        assert_eq!(team.read().unwrap().key(), Some(7));
        assert!(team.assign_key(7).is_ok());
        assert!(matches!(
            team.assign_key(8),
            Err(RepoError::ConstraintViolation(_))
        ));
    }
}
