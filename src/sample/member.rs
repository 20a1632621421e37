use super::team::Team;
use crate::core::{Key, Record, Result};
use crate::entity::Entity;
use crate::query::Field;
use crate::session::{EntityRef, FetchPlan, Lazy, LoadContext};

pub const USERNAME: Field<Member, String> = Field::new("username");
pub const AGE: Field<Member, i32> = Field::new("age");
pub const TEAM_NAME: Field<Member, String> = Field::new("team.name");

#[derive(Debug, Clone)]
pub struct Member {
    pub id: Option<Key>,
    pub username: String,
    pub age: i32,
    pub team: Option<Lazy<Team>>,
}

impl Member {
    pub fn new(username: &str, age: i32) -> Self {
        Self {
            id: None,
            username: username.to_string(),
            age,
            team: None,
        }
    }

    /// Moves `member` to `team` (or out of any team). The foreign key on the
    /// member is what gets stored; loaded member lists of the old and new
    /// team follow in memory.
    pub fn change_team(member: &EntityRef<Member>, team: Option<&EntityRef<Team>>) -> Result<()> {
        let previous = {
            let mut data = member.write()?;
            std::mem::replace(&mut data.team, team.map(|t| Lazy::resolved(t.clone())))
        };

        if let Some(old) = previous.and_then(|lazy| lazy.loaded()) {
            old.read()?.members.unlink(member)?;
        }
        if let Some(team) = team {
            team.read()?.members.link(member)?;
        }
        Ok(())
    }
}

impl Entity for Member {
    const NAME: &'static str = "Member";

    fn key(&self) -> Option<Key> {
        self.id
    }

    fn set_key(&mut self, key: Key) {
        self.id = Some(key);
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("id", self.id)
            .with("username", self.username.as_str())
            .with("age", self.age)
            .with("team", self.team.as_ref().and_then(Lazy::key))
    }

    fn from_record(record: &Record, ctx: &mut LoadContext) -> Result<Self> {
        Ok(Self {
            id: record.read("id")?,
            username: record.read("username")?,
            age: record.read("age")?,
            team: ctx.reference::<Team>(record.require("team")?)?,
        })
    }

    fn associated_records(&self) -> Result<Vec<(&'static str, Record)>> {
        match self.team.as_ref().and_then(Lazy::loaded) {
            Some(team) => Ok(vec![("team", team.record()?)]),
            None => Ok(Vec::new()),
        }
    }

    fn fetch_plan(plan: &mut FetchPlan) {
        plan.to_one::<Team>("team");
    }
}
