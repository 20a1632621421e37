use super::lazy::{Lazy, LazyList};
use super::unit_of_work::UnitOfWork;
use crate::core::{Key, RepoError, Result, Value};
use crate::entity::Entity;
use async_trait::async_trait;
use std::marker::PhantomData;

/// Handed to [`Entity::from_record`] so associations bind to the unit of work
/// that loads the entity.
pub struct LoadContext {
    uow: Option<UnitOfWork>,
}

impl LoadContext {
    pub(crate) fn attached(uow: &UnitOfWork) -> Self {
        Self {
            uow: Some(uow.clone()),
        }
    }

    /// Context without a unit of work; every association it produces is
    /// detached until replaced.
    pub fn detached() -> Self {
        Self { uow: None }
    }

    /// To-one association from its foreign key value. Resolves to the managed
    /// instance when the identity map already holds it.
    pub fn reference<T: Entity>(&mut self, value: &Value) -> Result<Option<Lazy<T>>> {
        let key = match value {
            Value::Null => return Ok(None),
            Value::Integer(key) => *key,
            other => {
                return Err(RepoError::TypeMismatch(format!(
                    "Reference to {} must be an INTEGER key, got {}",
                    T::NAME,
                    other.type_name()
                )));
            }
        };

        let Some(uow) = &self.uow else {
            return Ok(Some(Lazy::unloaded(key, None)));
        };
        if let Some(managed) = uow.cached::<T>(key)? {
            return Ok(Some(Lazy::resolved(managed)));
        }
        Ok(Some(Lazy::unloaded(key, Some(uow.token()?))))
    }

    /// Inverse collection whose elements point at `owner_key` through `mapped_by`.
    pub fn collection<T: Entity>(&mut self, owner_key: Option<Key>, mapped_by: &str) -> Result<LazyList<T>> {
        let token = match &self.uow {
            Some(uow) => Some(uow.token()?),
            None => None,
        };
        Ok(LazyList::unloaded(owner_key, mapped_by, token))
    }
}

/// Loads the targets of one to-one association for a batch of keys.
#[async_trait]
pub(crate) trait AssociationLoader: Send + Sync {
    fn association(&self) -> &str;

    async fn preload(&self, uow: &UnitOfWork, keys: Vec<Key>) -> Result<usize>;
}

struct ToOneLoader<T> {
    association: &'static str,
    _target: PhantomData<fn() -> T>,
}

#[async_trait]
impl<T: Entity> AssociationLoader for ToOneLoader<T> {
    fn association(&self) -> &str {
        self.association
    }

    async fn preload(&self, uow: &UnitOfWork, keys: Vec<Key>) -> Result<usize> {
        Ok(uow.load_by_keys::<T>(keys).await?.len())
    }
}

/// Associations an entity knows how to fetch eagerly.
#[derive(Default)]
pub struct FetchPlan {
    loaders: Vec<Box<dyn AssociationLoader>>,
}

impl FetchPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the to-one association `association` targeting `T`.
    pub fn to_one<T: Entity>(&mut self, association: &'static str) -> &mut Self {
        self.loaders.push(Box::new(ToOneLoader::<T> {
            association,
            _target: PhantomData,
        }));
        self
    }

    pub fn supports(&self, association: &str) -> bool {
        self.loader(association).is_some()
    }

    pub(crate) fn loader(&self, association: &str) -> Option<&dyn AssociationLoader> {
        self.loaders
            .iter()
            .find(|l| l.association() == association)
            .map(|l| l.as_ref())
    }
}
