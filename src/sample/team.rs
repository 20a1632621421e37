use super::member::Member;
use crate::core::{Key, Record, Result};
use crate::entity::Entity;
use crate::session::{LazyList, LoadContext};

#[derive(Debug, Clone)]
pub struct Team {
    pub id: Option<Key>,
    pub name: String,
    /// Inverse side; [`Member::change_team`] keeps it in sync.
    pub members: LazyList<Member>,
}

impl Team {
    pub fn new(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            members: LazyList::new(),
        }
    }
}

impl Entity for Team {
    const NAME: &'static str = "Team";

    fn key(&self) -> Option<Key> {
        self.id
    }

    fn set_key(&mut self, key: Key) {
        self.id = Some(key);
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("id", self.id)
            .with("name", self.name.as_str())
    }

    fn from_record(record: &Record, ctx: &mut LoadContext) -> Result<Self> {
        let id: Option<Key> = record.read("id")?;
        Ok(Self {
            id,
            name: record.read("name")?,
            members: ctx.collection::<Member>(id, "team")?,
        })
    }
}
