use super::change::{Change, UndoLog};
use super::locks::{LockKind, LockTable};
use super::native;
use super::sort::{SortExecutor, SortKey};
use super::table::Table;
use super::{QueryExecutor, SessionId};
use crate::core::{Key, RepoError, Result, Row, Value};
use crate::evaluator::{EvaluationContext, EvaluatorRegistry, ValueSource};
use crate::mapping::{EntityMapping, MappingRegistry, Terminal};
use crate::plugins::ExpressionPluginRegistry;
use crate::query::{Assignment, FieldPath, LockMode, NativeQuery, QueryDescription, Window};
use crate::result::ResultSet;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{Instrument, Level, event, info_span};

/// Statement counters, for checking how many round trips an operation made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutorStats {
    pub selects: u64,
    pub counts: u64,
    pub writes: u64,
    pub bulk: u64,
    pub natives: u64,
}

#[derive(Debug, Default)]
struct Counters {
    selects: AtomicU64,
    counts: AtomicU64,
    writes: AtomicU64,
    bulk: AtomicU64,
    natives: AtomicU64,
}

struct SessionState {
    undo: UndoLog,
    lock_timeout: Duration,
}

pub(super) type Tables = HashMap<String, Table>;

/// Reference [`QueryExecutor`] keeping every table in memory.
///
/// Query descriptions are evaluated directly against the rows; association
/// paths follow foreign keys into the target table. Writes are recorded per
/// session so a rollback can undo them.
pub struct InMemoryExecutor {
    registry: Arc<MappingRegistry>,
    tables: Mutex<Tables>,
    sessions: Mutex<HashMap<SessionId, SessionState>>,
    locks: LockTable,
    evaluators: EvaluatorRegistry,
    plugins: ExpressionPluginRegistry,
    counters: Counters,
}

/// A stored row seen through its mapping, resolving property paths.
pub(super) struct RowView<'a> {
    pub(super) registry: &'a MappingRegistry,
    pub(super) tables: &'a Tables,
    pub(super) entity: &'a str,
    pub(super) row: &'a Row,
}

impl RowView<'_> {
    fn column_value(table: &Table, row: &Row, column: &str) -> Result<Value> {
        let idx = table.column_index(column)?;
        Ok(row.get(idx).cloned().unwrap_or(Value::Null))
    }
}

impl ValueSource for RowView<'_> {
    fn value(&self, path: &FieldPath) -> Result<Value> {
        let resolved = self.registry.resolve_path(self.entity, path.as_str())?;
        let mut table = table_of(self.tables, self.entity)?;
        let mut row = self.row;

        for hop in &resolved.hops {
            let fk = Self::column_value(table, row, &hop.join_column)?;
            let Some(key) = fk.as_i64() else {
                return Ok(Value::Null);
            };
            table = table_of(self.tables, &hop.target)?;
            match table.get(key) {
                Some(target) => row = target,
                None => return Ok(Value::Null),
            }
        }

        let column = match &resolved.terminal {
            Terminal::Field(field) => field.column.as_str(),
            Terminal::ForeignKey { column, .. } => column.as_str(),
        };
        Self::column_value(table, row, column)
    }
}

pub(super) fn table_of<'a>(tables: &'a Tables, entity: &str) -> Result<&'a Table> {
    tables
        .get(entity)
        .ok_or_else(|| RepoError::Configuration(format!("No table for entity '{}'", entity)))
}

fn table_of_mut<'a>(tables: &'a mut Tables, entity: &str) -> Result<&'a mut Table> {
    tables
        .get_mut(entity)
        .ok_or_else(|| RepoError::Configuration(format!("No table for entity '{}'", entity)))
}

/// Rows that survived filtering, sorting, distinct and windowing.
struct Selection {
    columns: Vec<String>,
    rows: Vec<(Key, Row)>,
}

impl InMemoryExecutor {
    pub fn new(registry: Arc<MappingRegistry>) -> Self {
        let tables = registry
            .entity_names()
            .filter_map(|name| registry.get(name).ok())
            .map(|mapping| (mapping.name.clone(), Table::new(mapping)))
            .collect();

        Self {
            registry,
            tables: Mutex::new(tables),
            sessions: Mutex::new(HashMap::new()),
            locks: LockTable::new(),
            evaluators: EvaluatorRegistry::with_default_evaluators(),
            plugins: ExpressionPluginRegistry::with_default_plugins(),
            counters: Counters::default(),
        }
    }

    pub fn registry(&self) -> &MappingRegistry {
        &self.registry
    }

    pub fn stats(&self) -> ExecutorStats {
        ExecutorStats {
            selects: self.counters.selects.load(Ordering::Relaxed),
            counts: self.counters.counts.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            bulk: self.counters.bulk.load(Ordering::Relaxed),
            natives: self.counters.natives.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        self.counters.selects.store(0, Ordering::Relaxed);
        self.counters.counts.store(0, Ordering::Relaxed);
        self.counters.writes.store(0, Ordering::Relaxed);
        self.counters.bulk.store(0, Ordering::Relaxed);
        self.counters.natives.store(0, Ordering::Relaxed);
    }

    /// Stored row count of an entity's table.
    pub fn row_count(&self, entity: &str) -> Result<usize> {
        let tables = self.tables.lock()?;
        Ok(table_of(&tables, entity)?.len())
    }

    /// Number of row locks `session` holds.
    pub fn locks_held(&self, session: SessionId) -> Result<usize> {
        self.locks.held_by(session)
    }

    fn lock_timeout(&self, session: SessionId) -> Result<Duration> {
        let sessions = self.sessions.lock()?;
        sessions
            .get(&session)
            .map(|s| s.lock_timeout)
            .ok_or_else(|| RepoError::Execution(format!("Unknown or finished session {}", session)))
    }

    fn record(&self, session: SessionId, changes: Vec<Change>) -> Result<()> {
        let mut sessions = self.sessions.lock()?;
        let state = sessions
            .get_mut(&session)
            .ok_or_else(|| RepoError::Execution(format!("Unknown or finished session {}", session)))?;
        for change in changes {
            state.undo.record(change);
        }
        Ok(())
    }

    fn matching_keys(&self, tables: &Tables, query: &QueryDescription) -> Result<Vec<Key>> {
        let table = table_of(tables, &query.entity)?;
        let context = EvaluationContext::new(&self.evaluators);
        let mut keys = Vec::new();
        for (key, row) in table.scan() {
            let view = RowView {
                registry: &self.registry,
                tables,
                entity: &query.entity,
                row,
            };
            if context.matches(&query.predicate, &view)? {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    /// Filter, sort, project, distinct, row cap and window, in that order.
    fn select(&self, tables: &Tables, query: &QueryDescription, windowed: bool) -> Result<Selection> {
        let mapping = self.registry.get(&query.entity)?;
        let table = table_of(tables, &query.entity)?;
        let paths = query.shape.selected_paths();
        let columns: Vec<String> = match &paths {
            None => mapping.storage_columns().into_iter().map(|c| c.property).collect(),
            Some(paths) => paths.iter().map(|p| p.to_string()).collect(),
        };
        let sort_keys = SortKey::from_sort(&query.sort);

        let mut rows: Vec<(Vec<Value>, (Key, Row))> = Vec::new();
        for key in self.matching_keys(tables, query)? {
            let Some(row) = table.get(key) else {
                continue;
            };
            let view = RowView {
                registry: &self.registry,
                tables,
                entity: &query.entity,
                row,
            };
            let sort_values = query
                .sort
                .orders()
                .iter()
                .map(|order| view.value(&order.path))
                .collect::<Result<Vec<_>>>()?;
            let projected = match &paths {
                None => row.clone(),
                Some(paths) => paths
                    .iter()
                    .map(|path| view.value(path))
                    .collect::<Result<Vec<_>>>()?,
            };
            rows.push((sort_values, (key, projected)));
        }

        SortExecutor::sort(&mut rows, &sort_keys)?;
        let mut rows: Vec<(Key, Row)> = rows.into_iter().map(|(_, row)| row).collect();

        if query.distinct {
            let mut seen = HashSet::new();
            rows.retain(|(_, row)| seen.insert(row.clone()));
        }

        if windowed {
            // Top<N> bounds the whole result; the page window lives inside it.
            if let Some(max) = query.max_results {
                rows.truncate(usize::try_from(max).unwrap_or(usize::MAX));
            }
            rows = window_rows(rows, query.window.as_ref());
        }

        Ok(Selection { columns, rows })
    }

    async fn lock_rows(&self, session: SessionId, entity: &str, keys: &[Key], mode: LockMode) -> Result<()> {
        let kind = match mode {
            LockMode::None => return Ok(()),
            LockMode::PessimisticRead => LockKind::Shared,
            LockMode::PessimisticWrite => LockKind::Exclusive,
        };
        let timeout = self.lock_timeout(session)?;
        for key in keys {
            self.locks.acquire(session, entity, *key, kind, timeout).await?;
        }
        event!(Level::DEBUG, entity, rows = keys.len(), ?kind, "rows locked");
        Ok(())
    }

    fn check_assignments(&self, mapping: &EntityMapping, assignments: &[Assignment]) -> Result<Vec<(usize, Assignment)>> {
        let columns = mapping.storage_columns();
        assignments
            .iter()
            .map(|assignment| {
                let path = assignment.path().as_str();
                let field = mapping
                    .field_mapping(path)
                    .filter(|f| f.name != mapping.id.name)
                    .ok_or_else(|| {
                        RepoError::Configuration(format!(
                            "Bulk update can only assign local fields of {}, not '{}'",
                            mapping.name, path
                        ))
                    })?;
                let idx = columns
                    .iter()
                    .position(|c| c.column == field.column)
                    .ok_or_else(|| {
                        RepoError::Configuration(format!("No storage column for '{}'", path))
                    })?;
                Ok((idx, assignment.clone()))
            })
            .collect()
    }
}

fn apply_assignments(
    table: &mut Table,
    entity: &str,
    keys: &[Key],
    assignments: &[(usize, Assignment)],
    changes: &mut Vec<Change>,
) -> Result<()> {
    for &key in keys {
        let Some(mut row) = table.get(key).cloned() else {
            continue;
        };
        for (idx, assignment) in assignments {
            row[*idx] = match assignment {
                Assignment::Set { value, .. } => value.clone(),
                Assignment::Increment { delta, .. } => row[*idx].checked_add(*delta)?,
            };
        }
        if let Some(old_row) = table.update(key, row)? {
            changes.push(Change::Update {
                entity: entity.to_string(),
                key,
                old_row,
            });
        }
    }
    Ok(())
}

pub(super) fn window_rows<T>(rows: Vec<T>, window: Option<&Window>) -> Vec<T> {
    match window {
        None => rows,
        Some(window) => {
            let offset = usize::try_from(window.offset()).unwrap_or(usize::MAX);
            let limit = usize::try_from(window.limit()).unwrap_or(usize::MAX);
            rows.into_iter().skip(offset).take(limit).collect()
        }
    }
}

#[async_trait]
impl QueryExecutor for InMemoryExecutor {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn begin(&self, session: SessionId, lock_timeout: Duration) -> Result<()> {
        let mut sessions = self.sessions.lock()?;
        if sessions.contains_key(&session) {
            return Err(RepoError::Configuration(format!(
                "Session {} already began",
                session
            )));
        }
        sessions.insert(
            session,
            SessionState {
                undo: UndoLog::new(),
                lock_timeout,
            },
        );
        Ok(())
    }

    async fn fetch(&self, session: SessionId, query: &QueryDescription) -> Result<ResultSet> {
        self.counters.selects.fetch_add(1, Ordering::Relaxed);
        let span = info_span!("executor.fetch", entity = %query.entity, session = %session);

        async move {
            if query.lock != LockMode::None {
                let keys: Vec<Key> = {
                    let tables = self.tables.lock()?;
                    let selection = self.select(&tables, query, true)?;
                    selection.rows.iter().map(|(key, _)| *key).collect()
                };
                self.lock_rows(session, &query.entity, &keys, query.lock).await?;
            }

            let selection = {
                let tables = self.tables.lock()?;
                self.select(&tables, query, true)?
            };
            event!(Level::TRACE, rows = selection.rows.len(), "fetch done");
            Ok(ResultSet::new(
                selection.columns,
                selection.rows.into_iter().map(|(_, row)| row).collect(),
            ))
        }
        .instrument(span)
        .await
    }

    async fn count(&self, session: SessionId, query: &QueryDescription) -> Result<u64> {
        self.counters.counts.fetch_add(1, Ordering::Relaxed);
        let _span = info_span!("executor.count", entity = %query.entity, session = %session).entered();
        let tables = self.tables.lock()?;
        let selection = self.select(&tables, query, false)?;
        Ok(selection.rows.len() as u64)
    }

    async fn insert(&self, session: SessionId, entity: &str, row: Row) -> Result<Key> {
        self.lock_timeout(session)?;
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        let key = {
            let mut tables = self.tables.lock()?;
            table_of_mut(&mut tables, entity)?.insert(row)?
        };
        self.record(
            session,
            vec![Change::Insert {
                entity: entity.to_string(),
                key,
            }],
        )?;
        event!(Level::DEBUG, entity, key, session = %session, "row inserted");
        Ok(key)
    }

    async fn update(&self, session: SessionId, entity: &str, key: Key, row: Row) -> Result<bool> {
        let timeout = self.lock_timeout(session)?;
        self.locks.await_writable(session, entity, key, timeout).await?;
        self.counters.writes.fetch_add(1, Ordering::Relaxed);

        let old_row = {
            let mut tables = self.tables.lock()?;
            table_of_mut(&mut tables, entity)?.update(key, row)?
        };
        let Some(old_row) = old_row else {
            return Ok(false);
        };
        self.record(
            session,
            vec![Change::Update {
                entity: entity.to_string(),
                key,
                old_row,
            }],
        )?;
        event!(Level::DEBUG, entity, key, session = %session, "row updated");
        Ok(true)
    }

    async fn delete(&self, session: SessionId, entity: &str, key: Key) -> Result<bool> {
        let timeout = self.lock_timeout(session)?;
        self.locks.await_writable(session, entity, key, timeout).await?;
        self.counters.writes.fetch_add(1, Ordering::Relaxed);

        let old_row = {
            let mut tables = self.tables.lock()?;
            table_of_mut(&mut tables, entity)?.delete(key)
        };
        let Some(old_row) = old_row else {
            return Ok(false);
        };
        self.record(
            session,
            vec![Change::Delete {
                entity: entity.to_string(),
                key,
                old_row,
            }],
        )?;
        event!(Level::DEBUG, entity, key, session = %session, "row deleted");
        Ok(true)
    }

    async fn bulk_update(
        &self,
        session: SessionId,
        query: &QueryDescription,
        assignments: &[Assignment],
    ) -> Result<u64> {
        self.counters.bulk.fetch_add(1, Ordering::Relaxed);
        let span = info_span!("executor.bulk_update", entity = %query.entity, session = %session);

        async move {
            let timeout = self.lock_timeout(session)?;
            let mapping = self.registry.get(&query.entity)?;
            let assignments = self.check_assignments(mapping, assignments)?;

            let keys = {
                let tables = self.tables.lock()?;
                self.matching_keys(&tables, query)?
            };
            for key in &keys {
                self.locks.await_writable(session, &query.entity, *key, timeout).await?;
            }

            let mut changes = Vec::with_capacity(keys.len());
            let applied = {
                let mut tables = self.tables.lock()?;
                let table = table_of_mut(&mut tables, &query.entity)?;
                apply_assignments(table, &query.entity, &keys, &assignments, &mut changes)
            };

            // Rows changed before a failure still need their undo entries.
            let affected = changes.len() as u64;
            self.record(session, changes)?;
            applied?;
            event!(Level::DEBUG, affected, "bulk update applied");
            Ok(affected)
        }
        .instrument(span)
        .await
    }

    async fn bulk_delete(&self, session: SessionId, query: &QueryDescription) -> Result<u64> {
        self.counters.bulk.fetch_add(1, Ordering::Relaxed);
        let span = info_span!("executor.bulk_delete", entity = %query.entity, session = %session);

        async move {
            let timeout = self.lock_timeout(session)?;
            let keys = {
                let tables = self.tables.lock()?;
                self.matching_keys(&tables, query)?
            };
            for key in &keys {
                self.locks.await_writable(session, &query.entity, *key, timeout).await?;
            }

            let mut changes = Vec::with_capacity(keys.len());
            {
                let mut tables = self.tables.lock()?;
                let table = table_of_mut(&mut tables, &query.entity)?;
                for key in keys {
                    if let Some(old_row) = table.delete(key) {
                        changes.push(Change::Delete {
                            entity: query.entity.clone(),
                            key,
                            old_row,
                        });
                    }
                }
            }

            let affected = changes.len() as u64;
            self.record(session, changes)?;
            event!(Level::DEBUG, affected, "bulk delete applied");
            Ok(affected)
        }
        .instrument(span)
        .await
    }

    async fn native(
        &self,
        session: SessionId,
        query: &NativeQuery,
        window: Option<Window>,
    ) -> Result<ResultSet> {
        self.counters.natives.fetch_add(1, Ordering::Relaxed);
        let _span = info_span!("executor.native", session = %session).entered();
        self.lock_timeout(session)?;
        let prepared = query.prepare()?;
        let tables = self.tables.lock()?;
        native::execute(&self.registry, &tables, &self.plugins, &self.evaluators, &prepared, window.as_ref())
    }

    async fn commit(&self, session: SessionId) -> Result<()> {
        let removed = self.sessions.lock()?.remove(&session);
        if removed.is_none() {
            return Err(RepoError::Execution(format!(
                "Unknown or finished session {}",
                session
            )));
        }
        let released = self.locks.release_all(session)?;
        event!(Level::DEBUG, session = %session, released, "session committed");
        Ok(())
    }

    async fn rollback(&self, session: SessionId) -> Result<()> {
        let state = self.sessions.lock()?.remove(&session);
        let Some(mut state) = state else {
            return Err(RepoError::Execution(format!(
                "Unknown or finished session {}",
                session
            )));
        };

        let undone = state.undo.len();
        {
            let mut tables = self.tables.lock()?;
            for change in state.undo.drain_reversed() {
                let table = table_of_mut(&mut tables, change.entity())?;
                match change {
                    Change::Insert { key, .. } => {
                        table.delete(key);
                    }
                    Change::Update { key, old_row, .. } | Change::Delete { key, old_row, .. } => {
                        table.restore(key, old_row);
                    }
                }
            }
        }

        let released = self.locks.release_all(session)?;
        event!(Level::DEBUG, session = %session, undone, released, "session rolled back");
        Ok(())
    }

    async fn release_locks(&self, session: SessionId) -> Result<usize> {
        self.locks.release_all(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Predicate, ResultShape, Sort};
    use crate::sample;
    use uuid::Uuid;

    async fn seeded() -> (InMemoryExecutor, SessionId) {
        let executor = InMemoryExecutor::new(Arc::new(sample::mapping().unwrap()));
        let session = Uuid::new_v4();
        executor.begin(session, Duration::ZERO).await.unwrap();
        let team_a = executor
            .insert(session, "Team", vec![Value::Null, "teamA".into()])
            .await
            .unwrap();
        for (name, age, team) in [("m1", 10, Some(team_a)), ("m2", 20, Some(team_a)), ("m3", 30, None)] {
            executor
                .insert(
                    session,
                    "Member",
                    vec![Value::Null, name.into(), age.into(), team.into()],
                )
                .await
                .unwrap();
        }
        (executor, session)
    }

    #[tokio::test]
    async fn test_association_path_filter() {
        let (executor, session) = seeded().await;
        let query = QueryDescription::new("Member")
            .filter(Predicate::eq("team.name", "teamA"))
            .sorted(Sort::desc("username"))
            .shape(ResultShape::scalar(&["username", "team.name"]));
        let result = executor.fetch(session, &query).await.unwrap();
        assert_eq!(result.columns, vec!["username", "team.name"]);
        let names: Vec<_> = result.rows.iter().map(|r| r[0].clone()).collect();
        assert_eq!(names, vec![Value::from("m2"), Value::from("m1")]);
    }

    #[tokio::test]
    async fn test_null_fk_path_is_null() {
        let (executor, session) = seeded().await;
        let query = QueryDescription::new("Member").filter(Predicate::is_null("team.name"));
        let result = executor.fetch(session, &query).await.unwrap();
        assert_eq!(result.records()[0].get("username"), Some(&Value::from("m3")));
        assert_eq!(executor.count(session, &query).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rollback_undoes_writes() {
        let (executor, session) = seeded().await;
        executor.commit(session).await.unwrap();

        let other = Uuid::new_v4();
        executor.begin(other, Duration::ZERO).await.unwrap();
        let affected = executor
            .bulk_update(
                other,
                &QueryDescription::new("Member"),
                &[Assignment::increment("age", 1)],
            )
            .await
            .unwrap();
        assert_eq!(affected, 3);
        assert!(executor.delete(other, "Member", 1).await.unwrap());
        executor.rollback(other).await.unwrap();

        assert_eq!(executor.row_count("Member").unwrap(), 3);
        let check = Uuid::new_v4();
        executor.begin(check, Duration::ZERO).await.unwrap();
        let ages = executor
            .fetch(
                check,
                &QueryDescription::new("Member")
                    .sorted(Sort::asc("age"))
                    .shape(ResultShape::scalar(&["age"])),
            )
            .await
            .unwrap();
        assert_eq!(ages.rows[0][0], Value::Integer(10));
    }

    #[tokio::test]
    async fn test_failed_bulk_update_rolls_back_applied_rows() {
        let executor = InMemoryExecutor::new(Arc::new(sample::mapping().unwrap()));
        let setup = Uuid::new_v4();
        executor.begin(setup, Duration::ZERO).await.unwrap();
        for (name, age) in [("low", 1), ("high", i64::MAX)] {
            executor
                .insert(setup, "Member", vec![Value::Null, name.into(), age.into(), Value::Null])
                .await
                .unwrap();
        }
        executor.commit(setup).await.unwrap();

        let session = Uuid::new_v4();
        executor.begin(session, Duration::ZERO).await.unwrap();
        let err = executor
            .bulk_update(
                session,
                &QueryDescription::new("Member"),
                &[Assignment::increment("age", 1)],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Execution(_)));
        executor.rollback(session).await.unwrap();

        let check = Uuid::new_v4();
        executor.begin(check, Duration::ZERO).await.unwrap();
        let ages = executor
            .fetch(
                check,
                &QueryDescription::new("Member")
                    .sorted(Sort::asc("age"))
                    .shape(ResultShape::scalar(&["age"])),
            )
            .await
            .unwrap();
        let ages: Vec<Value> = ages.rows.into_iter().map(|r| r[0].clone()).collect();
        assert_eq!(ages, vec![Value::Integer(1), Value::Integer(i64::MAX)]);
    }

    #[tokio::test]
    async fn test_row_cap_bounds_the_window() {
        let (executor, session) = seeded().await;
        let top_two = QueryDescription::new("Member")
            .sorted(Sort::desc("age"))
            .max_results(2)
            .shape(ResultShape::scalar(&["username"]));

        let first = executor
            .fetch(session, &top_two.clone().window(Window::Page { index: 0, size: 2 }))
            .await
            .unwrap();
        assert_eq!(first.rows.len(), 2);
        let beyond = executor
            .fetch(session, &top_two.window(Window::Page { index: 1, size: 2 }))
            .await
            .unwrap();
        assert!(beyond.is_empty());
    }

    #[tokio::test]
    async fn test_bulk_rejects_association_assignment() {
        let (executor, session) = seeded().await;
        let err = executor
            .bulk_update(
                session,
                &QueryDescription::new("Member"),
                &[Assignment::set("team.name", "x")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_write_lock_blocks_other_session() {
        let (executor, session) = seeded().await;
        executor.commit(session).await.unwrap();

        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        executor.begin(a, Duration::ZERO).await.unwrap();
        executor.begin(b, Duration::ZERO).await.unwrap();
        let by_name = QueryDescription::new("Member")
            .filter(Predicate::eq("username", "m1"))
            .lock(LockMode::PessimisticWrite);
        executor.fetch(a, &by_name).await.unwrap();
        assert_eq!(executor.locks_held(a).unwrap(), 1);

        let err = executor.fetch(b, &by_name).await.unwrap_err();
        assert!(matches!(err, RepoError::LockAcquisition { .. }));

        executor.commit(a).await.unwrap();
        executor.fetch(b, &by_name).await.unwrap();
    }
}
