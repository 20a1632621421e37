use crate::core::{Key, Record, Result};
use crate::entity::Entity;
use crate::session::LoadContext;
use chrono::{DateTime, Utc};

/// Entity with a caller-assigned key. An unset creation timestamp marks it
/// as new, so saving a fresh instance inserts instead of merging.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub code: Key,
    pub label: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl Item {
    pub fn new(code: Key, label: &str) -> Self {
        Self {
            code,
            label: label.to_string(),
            created_at: None,
        }
    }
}

impl Entity for Item {
    const NAME: &'static str = "Item";

    fn key(&self) -> Option<Key> {
        Some(self.code)
    }

    fn set_key(&mut self, key: Key) {
        self.code = key;
    }

    fn is_new(&self) -> bool {
        self.created_at.is_none()
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("code", self.code)
            .with("label", self.label.as_str())
            .with("created_at", self.created_at)
    }

    fn from_record(record: &Record, _ctx: &mut LoadContext) -> Result<Self> {
        Ok(Self {
            code: record.read("code")?,
            label: record.read("label")?,
            created_at: record.read("created_at")?,
        })
    }

    fn on_persist(&mut self) {
        if self.created_at.is_none() {
            self.created_at = Some(Utc::now());
        }
    }
}
