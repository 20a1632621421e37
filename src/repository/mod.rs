//! Typed repositories: CRUD, derived query methods, specifications,
//! query-by-example, projections, paging, bulk statements and native
//! queries, all running inside a caller-supplied [`UnitOfWork`].

mod builder;
mod native;
mod queries;

pub use builder::RepositoryBuilder;

use crate::config::RepositoryConfig;
use crate::core::{Key, RepoError, Result};
use crate::entity::Entity;
use crate::mapping::MappingRegistry;
use crate::query::{Arg, DerivedQuery, LockMode, MethodKind, Predicate, QueryDescription, Sort};
use crate::session::{EntityRef, UnitOfWork};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

/// Per-method hints declared with [`RepositoryBuilder::method_with`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodOptions {
    pub read_only: bool,
    pub lock: LockMode,
    /// To-one associations resolved in one extra query per association.
    pub fetch: Vec<String>,
}

impl MethodOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loaded instances are not snapshotted and never written at flush.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn lock(mut self, mode: LockMode) -> Self {
        self.lock = mode;
        self
    }

    pub fn fetch(mut self, association: &str) -> Self {
        self.fetch.push(association.to_string());
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct NativeDeclaration {
    pub(crate) name: String,
    pub(crate) sql: String,
    pub(crate) count_sql: Option<String>,
}

/// Repository over entity type `E`. Built once, shared freely; every
/// operation takes the unit of work it runs in.
pub struct Repository<E> {
    registry: Arc<MappingRegistry>,
    config: RepositoryConfig,
    default_sort: Sort,
    methods: HashMap<String, (DerivedQuery, MethodOptions)>,
    natives: HashMap<String, NativeDeclaration>,
    _marker: PhantomData<fn() -> E>,
}

impl<E: Entity> Repository<E> {
    pub fn builder(registry: Arc<MappingRegistry>) -> RepositoryBuilder<E> {
        RepositoryBuilder::new(registry)
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn default_sort(&self) -> &Sort {
        &self.default_sort
    }

    pub fn declares(&self, method: &str) -> bool {
        self.methods.contains_key(method) || self.natives.contains_key(method)
    }

    fn id_property(&self) -> Result<&str> {
        Ok(self.registry.get(E::NAME)?.id.name.as_str())
    }

    fn base_query(&self) -> QueryDescription {
        QueryDescription::new(E::NAME).sorted(self.default_sort.clone())
    }

    /// Binds a declared method and applies its options. The method must be
    /// of `kind`.
    fn describe(&self, method: &str, kind: MethodKind, args: &[Arg]) -> Result<QueryDescription> {
        let (query, options) = self.methods.get(method).ok_or_else(|| {
            RepoError::Configuration(format!(
                "Method '{}' is not declared on the {} repository",
                method,
                E::NAME
            ))
        })?;
        if query.kind() != kind {
            return Err(RepoError::Configuration(format!(
                "Method '{}' is a {:?} method, called as {:?}",
                method,
                query.kind(),
                kind
            )));
        }

        let mut desc = query.bind(args)?;
        desc.sort = desc.sort.or_else(&self.default_sort);
        desc = desc.read_only(options.read_only).lock(options.lock);
        for association in &options.fetch {
            desc = desc.fetch(association.clone());
        }
        log::trace!("{}.{} bound to {:?}", E::NAME, method, desc.predicate);
        Ok(desc)
    }

    /// Inserts a new entity or merges a detached one, decided by
    /// [`Entity::is_new`]. Returns the managed instance.
    pub async fn save(&self, uow: &UnitOfWork, entity: E) -> Result<EntityRef<E>> {
        if entity.is_new() {
            uow.persist(entity).await
        } else {
            uow.merge(&EntityRef::new(entity)).await
        }
    }

    /// Saves through an existing handle. A handle the unit of work already
    /// manages is returned as is; changes reach storage at flush.
    pub async fn save_ref(&self, uow: &UnitOfWork, entity: &EntityRef<E>) -> Result<EntityRef<E>> {
        if uow.contains(entity)? {
            return Ok(entity.clone());
        }
        if entity.read()?.is_new() {
            uow.persist_ref(entity).await?;
            return Ok(entity.clone());
        }
        uow.merge(entity).await
    }

    pub async fn save_all(
        &self,
        uow: &UnitOfWork,
        entities: impl IntoIterator<Item = E>,
    ) -> Result<Vec<EntityRef<E>>> {
        let mut saved = Vec::new();
        for entity in entities {
            saved.push(self.save(uow, entity).await?);
        }
        Ok(saved)
    }

    pub async fn find_by_id(&self, uow: &UnitOfWork, key: Key) -> Result<Option<EntityRef<E>>> {
        uow.find::<E>(key).await
    }

    pub async fn exists_by_id(&self, uow: &UnitOfWork, key: Key) -> Result<bool> {
        if let Some(cached) = uow.cached::<E>(key)? {
            return Ok(!cached.is_removed());
        }
        let query = QueryDescription::new(E::NAME).filter(Predicate::eq(self.id_property()?, key));
        Ok(uow.count(&query).await? > 0)
    }

    pub async fn find_all(&self, uow: &UnitOfWork) -> Result<Vec<EntityRef<E>>> {
        uow.query::<E>(self.base_query()).await
    }

    pub async fn find_all_sorted(&self, uow: &UnitOfWork, sort: Sort) -> Result<Vec<EntityRef<E>>> {
        uow.query::<E>(QueryDescription::new(E::NAME).sorted(sort)).await
    }

    pub async fn count(&self, uow: &UnitOfWork) -> Result<u64> {
        uow.count(&QueryDescription::new(E::NAME)).await
    }

    /// Schedules removal; the row is deleted at flush.
    pub async fn delete(&self, uow: &UnitOfWork, entity: &EntityRef<E>) -> Result<()> {
        uow.remove(entity)
    }

    pub async fn delete_by_id(&self, uow: &UnitOfWork, key: Key) -> Result<()> {
        let entity = uow.find_required::<E>(key).await?;
        uow.remove(&entity)
    }

    /// Runs a declared `find...` method.
    pub async fn find(&self, uow: &UnitOfWork, method: &str, args: &[Arg]) -> Result<Vec<EntityRef<E>>> {
        let desc = self.describe(method, MethodKind::Find, args)?;
        uow.query::<E>(desc).await
    }

    /// Runs a declared `find...` method expected to match at most one row.
    pub async fn find_one(
        &self,
        uow: &UnitOfWork,
        method: &str,
        args: &[Arg],
    ) -> Result<Option<EntityRef<E>>> {
        let found = self.find(uow, method, args).await?;
        single(found)
    }

    pub async fn count_by(&self, uow: &UnitOfWork, method: &str, args: &[Arg]) -> Result<u64> {
        let desc = self.describe(method, MethodKind::Count, args)?;
        uow.count(&desc.count_query()).await
    }

    pub async fn exists_by(&self, uow: &UnitOfWork, method: &str, args: &[Arg]) -> Result<bool> {
        let desc = self.describe(method, MethodKind::Exists, args)?;
        Ok(uow.count(&desc.count_query()).await? > 0)
    }

    /// Loads the matching entities and removes each one, so removals go
    /// through the unit of work like [`Repository::delete`]. Returns how many
    /// were scheduled.
    pub async fn delete_by(&self, uow: &UnitOfWork, method: &str, args: &[Arg]) -> Result<usize> {
        let desc = self.describe(method, MethodKind::Delete, args)?;
        let found = uow.query::<E>(desc).await?;
        for entity in &found {
            uow.remove(entity)?;
        }
        log::debug!("{}.{} removed {} entit(ies)", E::NAME, method, found.len());
        Ok(found.len())
    }
}

fn single<T>(mut found: Vec<T>) -> Result<Option<T>> {
    if found.len() > 1 {
        return Err(RepoError::IncorrectResultSize {
            expected: 1,
            actual: found.len(),
        });
    }
    Ok(found.pop())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{self, Member, Team};
    use crate::store::Store;

    fn store() -> Store {
        Store::in_memory(sample::mapping().unwrap()).unwrap()
    }

    #[test]
    fn test_build_rejects_bad_declarations() {
        let store = store();
        let err = store
            .repository::<Member>()
            .method("findByNickname")
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, RepoError::UnresolvableQuery { ref method, .. } if method == "findByNickname"));

        let err = store
            .repository::<Member>()
            .method_with("findByAge", MethodOptions::new().fetch("members"))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, RepoError::UnresolvableQuery { .. }));

        let err = store
            .repository::<Member>()
            .native_query("broken", "select from where")
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, RepoError::UnresolvableQuery { ref method, .. } if method == "broken"));
    }

    #[test]
    fn test_top_accepts_default_sort() {
        let store = store();
        assert!(store.repository::<Member>().method("findTop2ByAge").build().is_err());
        assert!(
            store
                .repository::<Member>()
                .default_sort(Sort::asc("username"))
                .method("findTop2ByAge")
                .build()
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_crud_and_derived_methods() {
        let store = store();
        let members = store
            .repository::<Member>()
            .default_sort(Sort::asc("username"))
            .method("findByUsername")
            .method("findByAge")
            .method("countByAge")
            .method("existsByUsername")
            .method("deleteByAge")
            .build()
            .unwrap();

        let uow = store.begin().await.unwrap();
        members
            .save_all(
                &uow,
                vec![Member::new("m2", 10), Member::new("m1", 10), Member::new("m3", 30)],
            )
            .await
            .unwrap();
        assert_eq!(members.count(&uow).await.unwrap(), 3);

        let names: Vec<String> = members
            .find_all(&uow)
            .await
            .unwrap()
            .iter()
            .map(|m| m.read().unwrap().username.clone())
            .collect();
        assert_eq!(names, vec!["m1", "m2", "m3"]);

        let one = members
            .find_one(&uow, "findByUsername", &[Arg::value("m3")])
            .await
            .unwrap()
            .unwrap();
        assert!(members.exists_by_id(&uow, one.key().unwrap()).await.unwrap());

        let err = members
            .find_one(&uow, "findByAge", &[Arg::value(10)])
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::IncorrectResultSize { expected: 1, actual: 2 }));

        assert_eq!(members.count_by(&uow, "countByAge", &[Arg::value(10)]).await.unwrap(), 2);
        assert!(members.exists_by(&uow, "existsByUsername", &[Arg::value("m1")]).await.unwrap());
        assert!(matches!(
            members.count_by(&uow, "findByAge", &[Arg::value(10)]).await,
            Err(RepoError::Configuration(_))
        ));

        assert_eq!(members.delete_by(&uow, "deleteByAge", &[Arg::value(10)]).await.unwrap(), 2);
        uow.flush().await.unwrap();
        assert_eq!(members.count(&uow).await.unwrap(), 1);

        members.delete_by_id(&uow, one.key().unwrap()).await.unwrap();
        uow.flush().await.unwrap();
        assert_eq!(members.count(&uow).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_save_detached_instance_merges() {
        let store = store();
        let teams = store.repository::<Team>().build().unwrap();

        let uow = store.begin().await.unwrap();
        let key = teams.save(&uow, Team::new("red")).await.unwrap().key().unwrap();
        uow.commit().await.unwrap();

        let uow = store.begin().await.unwrap();
        let mut detached = Team::new("blue");
        detached.set_key(key);
        let merged = teams.save(&uow, detached).await.unwrap();
        assert_eq!(merged.read().unwrap().name, "blue");
        uow.commit().await.unwrap();

        let uow = store.begin().await.unwrap();
        let found = teams.find_by_id(&uow, key).await.unwrap().unwrap();
        assert_eq!(found.read().unwrap().name, "blue");
        assert!(matches!(
            teams.delete_by_id(&uow, key + 100).await,
            Err(RepoError::EntityNotFound { .. })
        ));
    }
}
