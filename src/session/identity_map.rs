use super::entity_ref::{EntityCell, EntityRef, ManagedEntry};
use crate::core::Key;
use crate::entity::Entity;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId {
    pub entity: &'static str,
    pub key: Key,
}

impl EntityId {
    pub fn of<E: Entity>(key: Key) -> Self {
        Self {
            entity: E::NAME,
            key,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity, self.key)
    }
}

/// Loaded entities of one unit of work by (entity, key).
#[derive(Default)]
pub(crate) struct IdentityMap {
    entries: BTreeMap<EntityId, Arc<dyn ManagedEntry>>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get<E: Entity>(&self, key: Key) -> Option<EntityRef<E>> {
        let entry = self.entries.get(&EntityId::of::<E>(key))?;
        let cell = Arc::clone(entry).into_any().downcast::<EntityCell<E>>().ok()?;
        Some(EntityRef::from_cell(cell))
    }

    /// Registers `candidate` unless the key is already present, and returns
    /// whichever instance the map holds afterwards.
    pub fn get_or_register<E: Entity>(&mut self, key: Key, candidate: EntityRef<E>) -> (EntityRef<E>, bool) {
        if let Some(existing) = self.get::<E>(key) {
            return (existing, false);
        }
        self.entries.insert(EntityId::of::<E>(key), candidate.entry());
        (candidate, true)
    }

    pub fn remove(&mut self, id: &EntityId) -> Option<Arc<dyn ManagedEntry>> {
        self.entries.remove(id)
    }

    /// Entries in key order.
    pub fn entries(&self) -> Vec<(EntityId, Arc<dyn ManagedEntry>)> {
        self.entries
            .iter()
            .map(|(id, entry)| (id.clone(), Arc::clone(entry)))
            .collect()
    }

    pub fn invalidate_all(&mut self) -> usize {
        let evicted = self.entries.len();
        self.entries.clear();
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Team;

    #[test]
    fn test_first_registration_wins() {
        let mut map = IdentityMap::new();
        let first = EntityRef::new(Team::new("teamA"));
        let (held, inserted) = map.get_or_register(1, first.clone());
        assert!(inserted && held.same_instance(&first));

        let (held, inserted) = map.get_or_register(1, EntityRef::new(Team::new("fresh row")));
        assert!(!inserted);
        assert!(held.same_instance(&first));
        assert_eq!(held.read().unwrap().name, "teamA");

        assert!(map.get::<Team>(1).unwrap().same_instance(&first));
        assert_eq!(map.invalidate_all(), 1);
        assert!(map.get::<Team>(1).is_none());
    }
}
