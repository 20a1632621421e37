use super::entity_ref::{EntityRef, ManagedEntry};
use super::identity_map::{EntityId, IdentityMap};
use super::load::{FetchPlan, LoadContext};
use crate::config::{FlushMode, RepositoryConfig};
use crate::core::{Key, Record, RepoError, Result, Value};
use crate::entity::Entity;
use crate::executor::{QueryExecutor, SessionId};
use crate::mapping::{FetchType, MappingRegistry};
use crate::materialize::entity_row;
use crate::query::{Assignment, NativeQuery, Predicate, QueryDescription, Window};
use crate::result::ResultSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use uuid::Uuid;

struct UowState {
    active: bool,
    /// Bumped by every clear; lazy handles from an older epoch are detached.
    epoch: u64,
    map: IdentityMap,
    pending_removals: Vec<(EntityId, Arc<dyn ManagedEntry>)>,
    stale_after_bulk: bool,
}

pub(crate) struct UowShared {
    id: SessionId,
    executor: Arc<dyn QueryExecutor>,
    registry: Arc<MappingRegistry>,
    config: RepositoryConfig,
    state: Mutex<UowState>,
}

/// Weak binding of a lazy association to the unit of work that produced it.
#[derive(Clone)]
pub(crate) struct SessionToken {
    shared: Weak<UowShared>,
    epoch: u64,
}

impl SessionToken {
    /// The owning unit of work, if it is still active and has not been
    /// cleared since the token was issued.
    pub(crate) fn attach(token: Option<&SessionToken>, entity: &str, key: Key) -> Result<UnitOfWork> {
        let detached = || RepoError::DetachedAccess {
            entity: entity.to_string(),
            key,
        };
        let token = token.ok_or_else(detached)?;
        let shared = token.shared.upgrade().ok_or_else(detached)?;
        {
            let state = shared.state.lock()?;
            if !state.active || state.epoch != token.epoch {
                return Err(detached());
            }
        }
        Ok(UnitOfWork { shared })
    }
}

/// A transactional scope: identity map, pending changes and executor session.
///
/// Cloning yields another handle to the same unit of work.
#[derive(Clone)]
pub struct UnitOfWork {
    shared: Arc<UowShared>,
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("id", &self.shared.id)
            .field("active", &self.is_active())
            .finish()
    }
}

impl UnitOfWork {
    pub async fn begin(
        executor: Arc<dyn QueryExecutor>,
        registry: Arc<MappingRegistry>,
        config: RepositoryConfig,
    ) -> Result<Self> {
        let id = Uuid::new_v4();
        executor.begin(id, config.lock_timeout_duration()).await?;
        log::debug!("Began unit of work {} on {}", id, executor.name());
        Ok(Self {
            shared: Arc::new(UowShared {
                id,
                executor,
                registry,
                config,
                state: Mutex::new(UowState {
                    active: true,
                    epoch: 0,
                    map: IdentityMap::new(),
                    pending_removals: Vec::new(),
                    stale_after_bulk: false,
                }),
            }),
        })
    }

    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    pub fn is_active(&self) -> bool {
        self.shared.state.lock().is_ok_and(|state| state.active)
    }

    pub fn registry(&self) -> &MappingRegistry {
        &self.shared.registry
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.shared.config
    }

    fn state(&self) -> Result<MutexGuard<'_, UowState>> {
        Ok(self.shared.state.lock()?)
    }

    fn active_state(&self) -> Result<MutexGuard<'_, UowState>> {
        let state = self.state()?;
        if !state.active {
            return Err(RepoError::Execution(format!(
                "Unit of work {} has ended",
                self.shared.id
            )));
        }
        Ok(state)
    }

    fn ensure_active(&self) -> Result<()> {
        self.active_state().map(|_| ())
    }

    pub(crate) fn token(&self) -> Result<SessionToken> {
        let state = self.state()?;
        Ok(SessionToken {
            shared: Arc::downgrade(&self.shared),
            epoch: state.epoch,
        })
    }

    fn id_property(&self, entity: &str) -> Result<String> {
        Ok(self.registry().get(entity)?.id.name.clone())
    }

    /// Number of managed instances.
    pub fn managed_count(&self) -> Result<usize> {
        Ok(self.state()?.map.len())
    }

    /// Whether this exact instance is managed by the unit of work.
    pub fn contains<E: Entity>(&self, entity: &EntityRef<E>) -> Result<bool> {
        let Some(key) = entity.key() else {
            return Ok(false);
        };
        Ok(self
            .state()?
            .map
            .get::<E>(key)
            .is_some_and(|managed| managed.same_instance(entity)))
    }

    /// Identity-map lookup that never touches storage.
    pub fn cached<E: Entity>(&self, key: Key) -> Result<Option<EntityRef<E>>> {
        let state = self.state()?;
        let found = state.map.get::<E>(key);
        if found.is_some() && state.stale_after_bulk {
            log::warn!(
                "{}#{} served from the identity map of unit of work {} after a bulk write; \
                 clear it to observe the bulk changes",
                E::NAME,
                key,
                self.shared.id
            );
        }
        Ok(found)
    }

    /// Makes a transient entity managed and inserts it.
    pub async fn persist<E: Entity>(&self, entity: E) -> Result<EntityRef<E>> {
        let handle = EntityRef::new(entity);
        self.persist_ref(&handle).await?;
        Ok(handle)
    }

    pub async fn persist_ref<E: Entity>(&self, entity: &EntityRef<E>) -> Result<()> {
        self.ensure_active()?;
        let mapping = self.registry().get(E::NAME)?;

        let record = {
            let mut data = entity.write()?;
            data.on_persist();
            for (association, associated) in data.associated_records()? {
                let Some(assoc) = mapping.association(association) else {
                    continue;
                };
                if !assoc.is_owning() {
                    continue;
                }
                let target_id = &self.registry().get(&assoc.target)?.id.name;
                if associated.get(target_id).is_none_or(Value::is_null) {
                    return Err(RepoError::ConstraintViolation(format!(
                        "{}.{} references a transient {}; persist it first",
                        E::NAME,
                        association,
                        assoc.target
                    )));
                }
            }
            data.to_record()
        };

        let row = entity_row(mapping, &record);
        let key = self
            .shared
            .executor
            .insert(self.shared.id, E::NAME, row)
            .await?;
        entity.assign_key(key)?;
        entity.take_snapshot()?;

        let mut state = self.active_state()?;
        let (held, _) = state.map.get_or_register(key, entity.clone());
        if !held.same_instance(entity) {
            return Err(RepoError::ConstraintViolation(format!(
                "Another instance of {}#{} is already managed",
                E::NAME,
                key
            )));
        }
        log::debug!("Persisted {}#{}", E::NAME, key);
        Ok(())
    }

    /// Managed instance for `key`, loading it if the identity map lacks it.
    pub async fn find<E: Entity>(&self, key: Key) -> Result<Option<EntityRef<E>>> {
        if let Some(found) = self.cached::<E>(key)? {
            return Ok((!found.is_removed()).then_some(found));
        }
        let id = self.id_property(E::NAME)?;
        let query = QueryDescription::new(E::NAME).filter(Predicate::eq(id.as_str(), key));
        Ok(self.query::<E>(query).await?.into_iter().next())
    }

    pub async fn find_required<E: Entity>(&self, key: Key) -> Result<EntityRef<E>> {
        self.find::<E>(key)
            .await?
            .ok_or_else(|| RepoError::EntityNotFound {
                entity: E::NAME.to_string(),
                key,
            })
    }

    /// Runs an entity-shaped query and returns managed instances. Rows whose
    /// key is already managed yield the managed instance unchanged.
    pub async fn query<E: Entity>(&self, query: QueryDescription) -> Result<Vec<EntityRef<E>>> {
        let records = self.fetch_rows(&query).await?.records();
        self.preload_associations::<E>(&query, &records).await?;

        let mut entities = Vec::with_capacity(records.len());
        for record in &records {
            let entity = self.materialize::<E>(record, query.read_only)?;
            if !entity.is_removed() {
                entities.push(entity);
            }
        }
        Ok(entities)
    }

    /// Managed instances for records fetched outside [`UnitOfWork::query`],
    /// such as native results. Associations stay lazy.
    pub(crate) fn materialize_records<E: Entity>(
        &self,
        records: &[Record],
        read_only: bool,
    ) -> Result<Vec<EntityRef<E>>> {
        let mut entities = Vec::with_capacity(records.len());
        for record in records {
            let entity = self.materialize::<E>(record, read_only)?;
            if !entity.is_removed() {
                entities.push(entity);
            }
        }
        Ok(entities)
    }

    /// Loads every key not yet managed with a single query. Returns the
    /// managed instances in `keys` order, skipping keys without a row.
    pub async fn load_by_keys<E: Entity>(&self, keys: Vec<Key>) -> Result<Vec<EntityRef<E>>> {
        let mut missing = Vec::new();
        for key in &keys {
            if self.state()?.map.get::<E>(*key).is_none() && !missing.contains(key) {
                missing.push(*key);
            }
        }

        if !missing.is_empty() {
            let id = self.id_property(E::NAME)?;
            let values = missing.iter().copied().map(Value::Integer).collect();
            let query = QueryDescription::new(E::NAME).filter(Predicate::in_list(id.as_str(), values));
            self.query::<E>(query).await?;
        }

        let state = self.state()?;
        Ok(keys.iter().filter_map(|key| state.map.get::<E>(*key)).collect())
    }

    async fn preload_associations<E: Entity>(
        &self,
        query: &QueryDescription,
        records: &[Record],
    ) -> Result<()> {
        let mapping = self.registry().get(E::NAME)?;
        let eager: Vec<&str> = mapping
            .associations
            .iter()
            .filter(|a| a.is_owning())
            .filter(|a| a.fetch == FetchType::Eager || query.fetch.contains(&a.name))
            .map(|a| a.name.as_str())
            .collect();
        if eager.is_empty() || records.is_empty() {
            return Ok(());
        }

        let mut plan = FetchPlan::new();
        E::fetch_plan(&mut plan);
        for association in eager {
            let loader = plan.loader(association).ok_or_else(|| {
                RepoError::Configuration(format!(
                    "{} has no loader for eager association '{}'",
                    E::NAME,
                    association
                ))
            })?;
            let mut keys: Vec<Key> = records
                .iter()
                .filter_map(|r| r.get(association).and_then(Value::as_i64))
                .collect();
            keys.sort_unstable();
            keys.dedup();
            if keys.is_empty() {
                continue;
            }
            let loaded = loader.preload(self, keys).await?;
            log::trace!("Preloaded {} target(s) of {}.{}", loaded, E::NAME, association);
        }
        Ok(())
    }

    fn materialize<E: Entity>(&self, record: &Record, read_only: bool) -> Result<EntityRef<E>> {
        let id = self.id_property(E::NAME)?;
        let key: Key = record.read(&id)?;
        if let Some(managed) = self.cached::<E>(key)? {
            return Ok(managed);
        }

        // Building may consult the identity map, so the state lock is not held here.
        let mut ctx = LoadContext::attached(self);
        let candidate = EntityRef::new(E::from_record(record, &mut ctx)?);
        if candidate.key().is_none() {
            candidate.assign_key(key)?;
        }
        if read_only {
            candidate.set_read_only(true);
        } else {
            candidate.take_snapshot()?;
        }

        let mut state = self.active_state()?;
        let (held, _) = state.map.get_or_register(key, candidate);
        Ok(held)
    }

    /// Raw rows of `query` after an automatic flush.
    pub async fn fetch_rows(&self, query: &QueryDescription) -> Result<ResultSet> {
        self.auto_flush().await?;
        self.shared.executor.fetch(self.shared.id, query).await
    }

    pub async fn count(&self, query: &QueryDescription) -> Result<u64> {
        self.auto_flush().await?;
        self.shared.executor.count(self.shared.id, query).await
    }

    pub async fn native(&self, query: &NativeQuery, window: Option<Window>) -> Result<ResultSet> {
        self.auto_flush().await?;
        self.shared.executor.native(self.shared.id, query, window).await
    }

    async fn auto_flush(&self) -> Result<()> {
        self.ensure_active()?;
        if self.shared.config.flush_mode == FlushMode::Auto {
            self.flush().await?;
        }
        Ok(())
    }

    /// Copies the state of `entity` onto the managed instance with the same
    /// key and returns that instance. A transient entity is persisted.
    pub async fn merge<E: Entity>(&self, entity: &EntityRef<E>) -> Result<EntityRef<E>> {
        self.ensure_active()?;
        let is_new = entity.read()?.is_new();
        let key = match entity.key() {
            Some(key) if !is_new => key,
            _ => {
                self.persist_ref(entity).await?;
                return Ok(entity.clone());
            }
        };

        let managed = match self.cached::<E>(key)? {
            Some(managed) if managed.same_instance(entity) => return Ok(managed),
            Some(managed) => managed,
            None => self
                .find::<E>(key)
                .await?
                .ok_or_else(|| RepoError::StaleReference {
                    entity: E::NAME.to_string(),
                    key,
                })?,
        };

        let record = entity.record()?;
        let mut ctx = LoadContext::attached(self);
        managed.replace(E::from_record(&record, &mut ctx)?)?;
        log::debug!("Merged detached {}#{}", E::NAME, key);
        Ok(managed)
    }

    /// Reloads the instance from storage, discarding in-memory changes.
    pub async fn refresh<E: Entity>(&self, entity: &EntityRef<E>) -> Result<()> {
        self.ensure_active()?;
        let key = entity.key().ok_or_else(|| {
            RepoError::Execution(format!("Cannot refresh a transient {}", E::NAME))
        })?;
        let id = self.id_property(E::NAME)?;
        let query = QueryDescription::new(E::NAME).filter(Predicate::eq(id.as_str(), key));
        let rows = self.fetch_rows(&query).await?.records();
        let record = rows.first().ok_or_else(|| RepoError::StaleReference {
            entity: E::NAME.to_string(),
            key,
        })?;

        let mut ctx = LoadContext::attached(self);
        entity.replace(E::from_record(record, &mut ctx)?)?;
        if !entity.is_read_only() {
            entity.take_snapshot()?;
        }
        Ok(())
    }

    /// Stages the removal of a managed entity; the row is deleted at flush.
    pub fn remove<E: Entity>(&self, entity: &EntityRef<E>) -> Result<()> {
        let Some(key) = entity.key() else {
            return Ok(());
        };
        let mut state = self.active_state()?;
        let id = EntityId::of::<E>(key);
        if !state.pending_removals.iter().any(|(pending, _)| *pending == id) {
            entity.set_removed(true);
            state.pending_removals.push((id, entity.entry()));
        }
        Ok(())
    }

    /// Writes dirty managed entities, then staged removals. Returns the
    /// number of statements issued. A removal stays staged until its delete
    /// succeeds, so a failed flush can be retried.
    pub async fn flush(&self) -> Result<usize> {
        let (entries, removals) = {
            let state = self.active_state()?;
            let removals: Vec<EntityId> = state
                .pending_removals
                .iter()
                .map(|(id, _)| id.clone())
                .collect();
            (state.map.entries(), removals)
        };

        let mut written = 0;
        for (id, entry) in entries {
            if entry.is_read_only() || entry.is_removed() {
                continue;
            }
            let Some(snapshot) = entry.snapshot()? else {
                continue;
            };
            let current = entry.current_record()?;
            if current.changed_fields(&snapshot).is_empty() {
                continue;
            }

            let mapping = self.registry().get(id.entity)?;
            let row = entity_row(mapping, &current);
            let updated = self
                .shared
                .executor
                .update(self.shared.id, id.entity, id.key, row)
                .await?;
            if !updated {
                return Err(RepoError::StaleReference {
                    entity: id.entity.to_string(),
                    key: id.key,
                });
            }
            entry.set_snapshot(Some(current))?;
            written += 1;
        }

        for id in removals {
            let deleted = self
                .shared
                .executor
                .delete(self.shared.id, id.entity, id.key)
                .await?;
            if !deleted {
                return Err(RepoError::StaleReference {
                    entity: id.entity.to_string(),
                    key: id.key,
                });
            }
            let mut state = self.state()?;
            state.pending_removals.retain(|(pending, _)| *pending != id);
            state.map.remove(&id);
            written += 1;
        }

        if written > 0 {
            log::debug!("Flushed {} statement(s) in unit of work {}", written, self.shared.id);
        }
        Ok(written)
    }

    /// Detaches every managed instance and discards unflushed changes.
    pub fn clear(&self) -> Result<usize> {
        let mut state = self.state()?;
        state.epoch += 1;
        state.pending_removals.clear();
        state.stale_after_bulk = false;
        let evicted = state.map.invalidate_all();
        log::debug!("Cleared {} managed instance(s) from unit of work {}", evicted, self.shared.id);
        Ok(evicted)
    }

    pub async fn commit(&self) -> Result<()> {
        self.flush().await?;
        self.shared.executor.commit(self.shared.id).await?;
        self.clear()?;
        self.state()?.active = false;
        log::debug!("Committed unit of work {}", self.shared.id);
        Ok(())
    }

    pub async fn rollback(&self) -> Result<()> {
        {
            let mut state = self.active_state()?;
            state.active = false;
            state.epoch += 1;
            state.pending_removals.clear();
            state.map.invalidate_all();
        }
        self.shared.executor.rollback(self.shared.id).await?;
        log::debug!("Rolled back unit of work {}", self.shared.id);
        Ok(())
    }

    /// Runs a bulk update directly against storage. `auto_clear` overrides
    /// the configured behavior for this call.
    pub async fn bulk_update(
        &self,
        query: &QueryDescription,
        assignments: &[Assignment],
        auto_clear: Option<bool>,
    ) -> Result<u64> {
        self.ensure_active()?;
        self.flush().await?;
        let affected = self
            .shared
            .executor
            .bulk_update(self.shared.id, query, assignments)
            .await?;
        self.after_bulk(affected, auto_clear)?;
        Ok(affected)
    }

    pub async fn bulk_delete(&self, query: &QueryDescription, auto_clear: Option<bool>) -> Result<u64> {
        self.ensure_active()?;
        self.flush().await?;
        let affected = self
            .shared
            .executor
            .bulk_delete(self.shared.id, query)
            .await?;
        self.after_bulk(affected, auto_clear)?;
        Ok(affected)
    }

    fn after_bulk(&self, affected: u64, auto_clear: Option<bool>) -> Result<()> {
        if auto_clear.unwrap_or(self.shared.config.auto_clear_after_bulk) {
            self.clear()?;
        } else {
            self.state()?.stale_after_bulk = true;
            log::debug!(
                "Bulk statement touched {} row(s); identity map of {} left as is",
                affected,
                self.shared.id
            );
        }
        Ok(())
    }
}
