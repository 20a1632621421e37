#![allow(dead_code)]

use memorepo::sample::{self, Member, Team};
use memorepo::{EntityRef, Key, MethodOptions, Repository, RepositoryConfig, Sort, Store};

pub fn store() -> Store {
    store_with(RepositoryConfig::default())
}

pub fn store_with(config: RepositoryConfig) -> Store {
    Store::with_config(sample::mapping().unwrap(), config).unwrap()
}

/// Member repository declaring every method the suites call.
pub fn members(store: &Store) -> Repository<Member> {
    store
        .repository::<Member>()
        .default_sort(Sort::asc("username"))
        .method("findByUsername")
        .method("findByAge")
        .method("findByAgeGreaterThanEqual")
        .method("findByTeamName")
        .method("findByUsernameAndTeamName")
        .method("findByUsernameStartingWith")
        .method("findTop2ByOrderByAgeDesc")
        .method("countByAge")
        .method("countByTeamName")
        .method_with("findAllByAgeGreaterThanEqual", MethodOptions::new().fetch("team"))
        .method_with("readByAgeGreaterThanEqual", MethodOptions::new().read_only())
        .native_query_with_count(
            "membersOfTeam",
            "select m.* from member m join team t on m.team_id = t.id where t.name = :team order by m.username desc",
            "select count(*) from member m join team t on m.team_id = t.id where t.name = :team",
        )
        .native_query("olderThan", "select * from member where age > ? order by age")
        .build()
        .unwrap()
}

pub fn teams(store: &Store) -> Repository<Team> {
    store
        .repository::<Team>()
        .method("findByName")
        .build()
        .unwrap()
}

/// Commits `members` as (username, age, team name) triples; teams are
/// created on first mention. Returns the member keys in input order.
pub async fn seed(store: &Store, members: &[(&str, i32, Option<&str>)]) -> Vec<Key> {
    let uow = store.begin().await.unwrap();
    let mut teams: Vec<(String, EntityRef<Team>)> = Vec::new();
    let mut keys = Vec::with_capacity(members.len());

    for (username, age, team_name) in members {
        let team = match team_name {
            None => None,
            Some(name) => match teams.iter().find(|(n, _)| n == name) {
                Some((_, team)) => Some(team.clone()),
                None => {
                    let team = uow.persist(Team::new(name)).await.unwrap();
                    teams.push((name.to_string(), team.clone()));
                    Some(team)
                }
            },
        };
        let member = EntityRef::new(Member::new(username, *age));
        Member::change_team(&member, team.as_ref()).unwrap();
        uow.persist_ref(&member).await.unwrap();
        keys.push(member.key().unwrap());
    }

    uow.commit().await.unwrap();
    keys
}

pub fn usernames(members: &[EntityRef<Member>]) -> Vec<String> {
    members
        .iter()
        .map(|m| m.read().unwrap().username.clone())
        .collect()
}

pub fn ages(members: &[EntityRef<Member>]) -> Vec<i32> {
    members.iter().map(|m| m.read().unwrap().age).collect()
}
