mod common;

use memorepo::config::NestedFetch;
use memorepo::projection::ProjectionSpec;
use memorepo::query::Arg;
use memorepo::sample::{MemberSummary, NestedClosedProjection, TeamInfo, UsernameOnly};
use memorepo::{RepoError, RepositoryConfig};

const ROSTER: &[(&str, i32, Option<&str>)] = &[
    ("m1", 10, Some("teamA")),
    ("m2", 20, Some("teamA")),
    ("m3", 30, Some("teamB")),
    ("m4", 40, None),
];

#[tokio::test]
async fn test_closed_projection_exposes_only_declared_fields() {
    let store = common::store();
    common::seed(&store, ROSTER).await;
    let members = common::members(&store);
    let uow = store.begin().await.unwrap();

    let views = members
        .find_views(&uow, "findByUsername", &[Arg::value("m1")], &ProjectionSpec::new("UsernameOnly").column("username"))
        .await
        .unwrap();
    assert_eq!(views[0].read::<String>("username").unwrap(), "m1");
    let err = views[0].get("age").unwrap_err();
    assert!(matches!(
        err,
        RepoError::UnsupportedProjectionField { ref projection, ref field }
            if projection == "UsernameOnly" && field == "age"
    ));

    let typed: Vec<UsernameOnly> = members
        .find_projected(&uow, "findByUsername", &[Arg::value("m1")])
        .await
        .unwrap();
    assert_eq!(typed, vec![UsernameOnly { username: "m1".into() }]);
}

#[tokio::test]
async fn test_dynamic_projection_per_call() {
    let store = common::store();
    common::seed(&store, ROSTER).await;
    let members = common::members(&store);
    let uow = store.begin().await.unwrap();

    let names: Vec<UsernameOnly> = members
        .find_projected(&uow, "findByTeamName", &[Arg::value("teamA")])
        .await
        .unwrap();
    let summaries: Vec<MemberSummary> = members
        .find_projected(&uow, "findByTeamName", &[Arg::value("teamA")])
        .await
        .unwrap();
    assert_eq!(names.len(), 2);
    assert_eq!(summaries[1].summary, "m2 20");
}

async fn nested_with(strategy: NestedFetch) -> (Vec<NestedClosedProjection>, u64) {
    let store = common::store_with(RepositoryConfig::new().nested_fetch(strategy));
    common::seed(&store, ROSTER).await;
    let members = common::members(&store);
    let uow = store.begin().await.unwrap();

    store.executor().reset_stats();
    let views = members
        .find_projected(&uow, "findByAgeGreaterThanEqual", &[Arg::value(0)])
        .await
        .unwrap();
    (views, store.executor().stats().selects)
}

#[tokio::test]
async fn test_nested_projection_join_and_secondary_agree() {
    let (joined, joined_selects) = nested_with(NestedFetch::Join).await;
    let (secondary, secondary_selects) = nested_with(NestedFetch::Secondary).await;

    assert_eq!(joined, secondary);
    assert_eq!(
        joined[0],
        NestedClosedProjection {
            username: "m1".into(),
            team: Some(TeamInfo { name: "teamA".into() }),
        }
    );
    assert_eq!(joined[3].team, None);

    assert_eq!(joined_selects, 1);
    // one per distinct team
    assert_eq!(secondary_selects, 3);
}

#[tokio::test]
async fn test_projection_with_unknown_path_is_rejected() {
    let store = common::store();
    let members = common::members(&store);
    let uow = store.begin().await.unwrap();

    let spec = ProjectionSpec::new("Broken").column("nickname");
    assert!(
        members
            .find_views(&uow, "findByUsername", &[Arg::value("m1")], &spec)
            .await
            .is_err()
    );
}
