use crate::core::{Key, Row};

/// One write made by a unit of work, recorded so rollback can undo it.
#[derive(Debug, Clone)]
pub enum Change {
    Insert { entity: String, key: Key },

    Update {
        entity: String,
        key: Key,
        old_row: Row,
    },

    Delete {
        entity: String,
        key: Key,
        old_row: Row,
    },
}

impl Change {
    pub fn entity(&self) -> &str {
        match self {
            Change::Insert { entity, .. }
            | Change::Update { entity, .. }
            | Change::Delete { entity, .. } => entity,
        }
    }

    pub fn key(&self) -> Key {
        match self {
            Change::Insert { key, .. } | Change::Update { key, .. } | Change::Delete { key, .. } => {
                *key
            }
        }
    }
}

/// Changes of one unit of work in the order they were made.
#[derive(Debug, Default)]
pub struct UndoLog {
    changes: Vec<Change>,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Changes newest first, the order they must be undone in.
    pub fn drain_reversed(&mut self) -> impl Iterator<Item = Change> + '_ {
        self.changes.drain(..).rev()
    }

    pub fn clear(&mut self) {
        self.changes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;

    #[test]
    fn test_drain_is_newest_first() {
        let mut log = UndoLog::new();
        log.record(Change::Insert {
            entity: "Member".into(),
            key: 1,
        });
        log.record(Change::Update {
            entity: "Member".into(),
            key: 1,
            old_row: vec![Value::Integer(1)],
        });
        let keys: Vec<_> = log
            .drain_reversed()
            .map(|c| matches!(c, Change::Update { .. }))
            .collect();
        assert_eq!(keys, vec![true, false]);
        assert!(log.is_empty());
    }
}
