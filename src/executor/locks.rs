use super::SessionId;
use crate::core::{Key, RepoError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    Shared,
    Exclusive,
}

#[derive(Debug)]
struct LockEntry {
    kind: LockKind,
    owners: HashSet<SessionId>,
}

type RowId = (String, Key);

/// Row-level pessimistic locks owned by units of work.
///
/// Locks are re-entrant for their owner; a sole shared owner may upgrade to
/// exclusive. Everything held by a session is released together.
#[derive(Debug, Default)]
pub struct LockTable {
    entries: Mutex<HashMap<RowId, LockEntry>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits up to `timeout` for the lock. A zero timeout fails immediately
    /// with `LockAcquisition`; an expired wait fails with `LockTimeout`.
    pub async fn acquire(
        &self,
        session: SessionId,
        entity: &str,
        key: Key,
        kind: LockKind,
        timeout: Duration,
    ) -> Result<()> {
        self.wait_for(entity, key, timeout, || self.try_acquire(session, entity, key, kind))
            .await
    }

    /// Waits until no other session holds a lock on the row, without taking one.
    pub async fn await_writable(
        &self,
        session: SessionId,
        entity: &str,
        key: Key,
        timeout: Duration,
    ) -> Result<()> {
        self.wait_for(entity, key, timeout, || self.is_free_for(session, entity, key))
            .await
    }

    async fn wait_for(
        &self,
        entity: &str,
        key: Key,
        timeout: Duration,
        mut attempt: impl FnMut() -> Result<bool>,
    ) -> Result<()> {
        if attempt()? {
            return Ok(());
        }
        if timeout.is_zero() {
            return Err(RepoError::LockAcquisition {
                entity: entity.to_string(),
                key,
            });
        }

        let started = Instant::now();
        loop {
            tokio::time::sleep(POLL_INTERVAL.min(timeout)).await;
            if attempt()? {
                return Ok(());
            }
            let waited = started.elapsed();
            if waited >= timeout {
                tracing::event!(
                    tracing::Level::DEBUG,
                    entity,
                    key,
                    waited_ms = waited.as_millis() as u64,
                    "lock wait timed out"
                );
                return Err(RepoError::LockTimeout {
                    entity: entity.to_string(),
                    key,
                    waited_ms: waited.as_millis() as u64,
                });
            }
        }
    }

    fn try_acquire(&self, session: SessionId, entity: &str, key: Key, kind: LockKind) -> Result<bool> {
        let mut entries = self.entries.lock()?;
        let id = (entity.to_string(), key);

        let Some(entry) = entries.get_mut(&id) else {
            entries.insert(
                id,
                LockEntry {
                    kind,
                    owners: HashSet::from([session]),
                },
            );
            return Ok(true);
        };

        let sole_owner = entry.owners.len() == 1 && entry.owners.contains(&session);
        let granted = match (entry.kind, kind) {
            (LockKind::Shared, LockKind::Shared) => {
                entry.owners.insert(session);
                true
            }
            (LockKind::Exclusive, _) => sole_owner,
            (LockKind::Shared, LockKind::Exclusive) if sole_owner => {
                entry.kind = LockKind::Exclusive;
                true
            }
            (LockKind::Shared, LockKind::Exclusive) => false,
        };
        Ok(granted)
    }

    fn is_free_for(&self, session: SessionId, entity: &str, key: Key) -> Result<bool> {
        let entries = self.entries.lock()?;
        Ok(entries
            .get(&(entity.to_string(), key))
            .is_none_or(|entry| entry.owners.iter().all(|owner| *owner == session)))
    }

    /// Releases every lock held by `session`; returns how many rows were freed.
    pub fn release_all(&self, session: SessionId) -> Result<usize> {
        let mut entries = self.entries.lock()?;
        let mut released = 0;
        entries.retain(|_, entry| {
            if entry.owners.remove(&session) {
                released += 1;
            }
            !entry.owners.is_empty()
        });
        Ok(released)
    }

    pub fn held_by(&self, session: SessionId) -> Result<usize> {
        let entries = self.entries.lock()?;
        Ok(entries
            .values()
            .filter(|entry| entry.owners.contains(&session))
            .count())
    }
}
