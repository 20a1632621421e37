use super::entity_ref::{EntityCell, EntityRef};
use super::unit_of_work::{SessionToken, UnitOfWork};
use crate::core::{Key, RepoError, Result};
use crate::entity::Entity;
use crate::query::{Predicate, QueryDescription};
use std::fmt;
use std::sync::{Arc, RwLock, Weak};
use tokio::sync::OnceCell;

struct LazyInner<T> {
    key: Option<Key>,
    value: OnceCell<EntityRef<T>>,
    token: Option<SessionToken>,
}

/// To-one association: either resolved to a handle, or a key that is loaded
/// through the owning unit of work on first access.
pub struct Lazy<T> {
    inner: Arc<LazyInner<T>>,
}

impl<T> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Entity> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy")
            .field("entity", &T::NAME)
            .field("key", &self.key())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl<T: Entity> Lazy<T> {
    pub fn resolved(entity: EntityRef<T>) -> Self {
        Self {
            inner: Arc::new(LazyInner {
                key: entity.key(),
                value: OnceCell::new_with(Some(entity)),
                token: None,
            }),
        }
    }

    pub(crate) fn unloaded(key: Key, token: Option<SessionToken>) -> Self {
        Self {
            inner: Arc::new(LazyInner {
                key: Some(key),
                value: OnceCell::new(),
                token,
            }),
        }
    }

    /// Key of the associated entity; follows the resolved handle when it was
    /// transient at assignment and has been persisted since.
    pub fn key(&self) -> Option<Key> {
        self.inner
            .value
            .get()
            .and_then(EntityRef::key)
            .or(self.inner.key)
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.value.initialized()
    }

    /// The handle, if already resolved. Never touches storage.
    pub fn loaded(&self) -> Option<EntityRef<T>> {
        self.inner.value.get().cloned()
    }

    /// Resolves the association, loading it through the owning unit of work
    /// the first time. Fails with `DetachedAccess` once that unit of work has
    /// ended or been cleared.
    pub async fn get(&self) -> Result<EntityRef<T>> {
        let entity = self
            .inner
            .value
            .get_or_try_init(|| async {
                let key = self.inner.key.ok_or_else(|| {
                    RepoError::Execution(format!("Unresolved {} reference has no key", T::NAME))
                })?;
                let uow = SessionToken::attach(self.inner.token.as_ref(), T::NAME, key)?;
                log::debug!("Lazy load of {}#{} in unit of work {}", T::NAME, key, uow.id());
                uow.find::<T>(key)
                    .await?
                    .ok_or_else(|| RepoError::EntityNotFound {
                        entity: T::NAME.to_string(),
                        key,
                    })
            })
            .await?;
        Ok(entity.clone())
    }
}

struct LazyListInner<T> {
    owner_key: Option<Key>,
    mapped_by: String,
    items: RwLock<Option<Vec<Weak<EntityCell<T>>>>>,
    token: Option<SessionToken>,
}

/// Inverse side of a one-to-many association.
///
/// Holds weak handles, so it never keeps its elements alive on its own; the
/// owning side's foreign key stays authoritative. A collection loaded through
/// a unit of work is only readable while that unit of work is attached; the
/// identity map is what keeps its elements alive.
pub struct LazyList<T> {
    inner: Arc<LazyListInner<T>>,
}

impl<T> Clone for LazyList<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Entity> fmt::Debug for LazyList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyList")
            .field("entity", &T::NAME)
            .field("mapped_by", &self.inner.mapped_by)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl<T: Entity> Default for LazyList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> LazyList<T> {
    /// An empty, already loaded collection for a new owner.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(LazyListInner {
                owner_key: None,
                mapped_by: String::new(),
                items: RwLock::new(Some(Vec::new())),
                token: None,
            }),
        }
    }

    pub(crate) fn unloaded(owner_key: Option<Key>, mapped_by: &str, token: Option<SessionToken>) -> Self {
        Self {
            inner: Arc::new(LazyListInner {
                owner_key,
                mapped_by: mapped_by.to_string(),
                items: RwLock::new(None),
                token,
            }),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.items.read().is_ok_and(|items| items.is_some())
    }

    /// Elements of a loaded collection, `None` before the first load. Fails
    /// with `DetachedAccess` once the unit of work it was loaded through has
    /// ended or been cleared.
    pub fn loaded(&self) -> Result<Option<Vec<EntityRef<T>>>> {
        let items = self.inner.items.read()?;
        let Some(items) = items.as_ref() else {
            return Ok(None);
        };
        if self.inner.token.is_some() {
            self.attach()?;
        }
        Ok(Some(upgrade_all(items)))
    }

    fn attach(&self) -> Result<UnitOfWork> {
        SessionToken::attach(
            self.inner.token.as_ref(),
            T::NAME,
            self.inner.owner_key.unwrap_or_default(),
        )
    }

    /// Loads the collection through the owning unit of work on first access.
    pub async fn load(&self) -> Result<Vec<EntityRef<T>>> {
        if let Some(items) = self.loaded()? {
            return Ok(items);
        }

        let owner_key = self.inner.owner_key.ok_or_else(|| {
            RepoError::Execution(format!(
                "Collection of {} has no owner key to load by",
                T::NAME
            ))
        })?;
        let uow = self.attach()?;
        let query = QueryDescription::new(T::NAME)
            .filter(Predicate::eq(self.inner.mapped_by.as_str(), owner_key));
        let loaded = uow.query::<T>(query).await?;

        let mut items = self.inner.items.write()?;
        if items.is_none() {
            *items = Some(loaded.iter().map(|e| Arc::downgrade(e.cell())).collect());
        }
        Ok(items.as_ref().map(|items| upgrade_all(items)).unwrap_or(loaded))
    }

    /// Adds an element on the in-memory side. An unloaded collection is left
    /// alone; it reads the owning side when it loads.
    pub fn link(&self, entity: &EntityRef<T>) -> Result<()> {
        if let Some(items) = self.inner.items.write()?.as_mut() {
            let weak = Arc::downgrade(entity.cell());
            if !items.iter().any(|w| w.ptr_eq(&weak)) {
                items.push(weak);
            }
        }
        Ok(())
    }

    pub fn unlink(&self, entity: &EntityRef<T>) -> Result<()> {
        if let Some(items) = self.inner.items.write()?.as_mut() {
            let weak = Arc::downgrade(entity.cell());
            items.retain(|w| !w.ptr_eq(&weak) && w.strong_count() > 0);
        }
        Ok(())
    }
}

fn upgrade_all<T: Entity>(items: &[Weak<EntityCell<T>>]) -> Vec<EntityRef<T>> {
    items
        .iter()
        .filter_map(Weak::upgrade)
        .map(EntityRef::from_cell)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{Member, Team};

    #[tokio::test]
    async fn test_unloaded_without_session_is_detached() {
        let lazy: Lazy<Team> = Lazy::unloaded(3, None);
        assert_eq!(lazy.key(), Some(3));
        assert!(!lazy.is_loaded());
        let err = lazy.get().await.unwrap_err();
        assert!(matches!(err, RepoError::DetachedAccess { key: 3, .. }));
    }

    #[tokio::test]
    async fn test_resolved_follows_later_key() {
        let team = EntityRef::new(Team::new("teamA"));
        let lazy = Lazy::resolved(team.clone());
        assert_eq!(lazy.key(), None);
        team.assign_key(5).unwrap();
        assert_eq!(lazy.key(), Some(5));
        assert!(lazy.get().await.unwrap().same_instance(&team));
    }

    #[test]
    fn test_list_holds_weak_handles() {
        let list: LazyList<Member> = LazyList::new();
        let member = EntityRef::new(Member::new("m1", 10));
        list.link(&member).unwrap();
        list.link(&member).unwrap();
        assert_eq!(list.loaded().unwrap().unwrap().len(), 1);

        drop(member);
        assert!(list.loaded().unwrap().unwrap().is_empty());
    }
}
