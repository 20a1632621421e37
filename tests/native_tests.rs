mod common;

use memorepo::sample::{Member, UsernameOnly};
use memorepo::{PageRequest, Params, RepoError, Value};

const ROSTER: &[(&str, i32, Option<&str>)] = &[
    ("m1", 10, Some("teamA")),
    ("m2", 20, Some("teamA")),
    ("m3", 30, Some("teamA")),
    ("m4", 40, Some("teamB")),
    ("m5", 50, None),
];

#[tokio::test]
async fn test_named_parameter_join_rows() {
    let store = common::store();
    common::seed(&store, ROSTER).await;
    let members = common::members(&store);
    let uow = store.begin().await.unwrap();

    let rows = members
        .native_rows(&uow, "membersOfTeam", Params::new().named("team", "teamA"))
        .await
        .unwrap();
    assert_eq!(rows.columns, vec!["member_id", "username", "age", "team_id"]);
    let names: Vec<&Value> = rows.rows().iter().map(|r| &r[1]).collect();
    assert_eq!(
        names,
        vec![
            &Value::Text("m3".into()),
            &Value::Text("m2".into()),
            &Value::Text("m1".into())
        ]
    );
}

#[tokio::test]
async fn test_positional_parameter_entities_are_managed() {
    let store = common::store();
    let keys = common::seed(&store, ROSTER).await;
    let members = common::members(&store);
    let uow = store.begin().await.unwrap();

    let managed = uow.find_required::<Member>(keys[3]).await.unwrap();
    let older = members
        .native_entities(&uow, "olderThan", Params::positional([25]))
        .await
        .unwrap();
    assert_eq!(common::usernames(&older), vec!["m3", "m4", "m5"]);
    assert!(older[1].same_instance(&managed));
    assert!(older[2].read().unwrap().team.is_none());
}

#[tokio::test]
async fn test_native_page_uses_count_query() {
    let store = common::store();
    common::seed(&store, ROSTER).await;
    let members = common::members(&store);
    let uow = store.begin().await.unwrap();

    let params = Params::new().named("team", "teamA");
    let first = members
        .native_projected_page::<UsernameOnly>(&uow, "membersOfTeam", params.clone(), &PageRequest::of(0, 2).unwrap())
        .await
        .unwrap();
    assert_eq!(
        first.content(),
        &[
            UsernameOnly { username: "m3".into() },
            UsernameOnly { username: "m2".into() }
        ]
    );
    assert_eq!(first.total_elements(), 3);
    assert_eq!(first.total_pages(), 2);
    assert!(first.has_next());

    let second = members
        .native_projected_page::<UsernameOnly>(&uow, "membersOfTeam", params, &PageRequest::of(1, 2).unwrap())
        .await
        .unwrap();
    assert_eq!(second.content(), &[UsernameOnly { username: "m1".into() }]);
    assert!(!second.has_next());
}

#[tokio::test]
async fn test_native_page_without_count_query_fails() {
    let store = common::store();
    let members = common::members(&store);
    let uow = store.begin().await.unwrap();

    let err = members
        .native_projected_page::<UsernameOnly>(&uow, "olderThan", Params::positional([1]), &PageRequest::of(0, 2).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::Configuration(_)));

    let err = members
        .native_rows(&uow, "undeclared", Params::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::Configuration(_)));
}
