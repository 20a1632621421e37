mod common;

use memorepo::query::Arg;
use memorepo::sample::{AGE, UsernameOnly};
use memorepo::{PageRequest, RepoError, RepositoryConfig, Sort};

const FIVE: &[(&str, i32, Option<&str>)] = &[
    ("m1", 10, None),
    ("m2", 10, None),
    ("m3", 10, None),
    ("m4", 10, None),
    ("m5", 10, None),
];

#[tokio::test]
async fn test_pages_in_descending_username_order() {
    let store = common::store();
    common::seed(&store, FIVE).await;
    let members = common::members(&store);
    let uow = store.begin().await.unwrap();

    let request = PageRequest::sorted_by(0, 3, Sort::desc("username")).unwrap();
    let page = members
        .find_page(&uow, "findByAge", &[Arg::value(10)], &request)
        .await
        .unwrap();
    assert_eq!(common::usernames(page.content()), vec!["m5", "m4", "m3"]);
    assert_eq!(page.total_elements(), 5);
    assert_eq!(page.total_pages(), 2);
    assert!(page.is_first());
    assert!(page.has_next());

    let page = members
        .find_page(&uow, "findByAge", &[Arg::value(10)], &request.next())
        .await
        .unwrap();
    assert_eq!(common::usernames(page.content()), vec!["m2", "m1"]);
    assert_eq!(page.total_elements(), 5);
    assert!(!page.is_first());
    assert!(!page.has_next());
}

#[tokio::test]
async fn test_partial_last_page_skips_count() {
    let store = common::store();
    common::seed(&store, FIVE).await;
    let members = common::members(&store);
    let uow = store.begin().await.unwrap();

    store.executor().reset_stats();
    let request = PageRequest::of(1, 3).unwrap();
    let page = members
        .find_page(&uow, "findByAge", &[Arg::value(10)], &request)
        .await
        .unwrap();
    assert_eq!(page.number_of_elements(), 2);
    assert_eq!(page.total_elements(), 5);
    assert_eq!(store.executor().stats().counts, 0);

    let page = members
        .find_page(&uow, "findByAge", &[Arg::value(10)], &PageRequest::of(0, 3).unwrap())
        .await
        .unwrap();
    assert_eq!(page.total_elements(), 5);
    assert_eq!(store.executor().stats().counts, 1);
}

#[tokio::test]
async fn test_slice_never_counts() {
    let store = common::store();
    common::seed(&store, FIVE).await;
    let members = common::members(&store);
    let uow = store.begin().await.unwrap();

    store.executor().reset_stats();
    let slice = members
        .find_slice(&uow, "findByAge", &[Arg::value(10)], &PageRequest::of(0, 3).unwrap())
        .await
        .unwrap();
    assert_eq!(slice.number_of_elements(), 3);
    assert!(slice.has_next());
    assert_eq!(store.executor().stats().counts, 0);

    let last = members
        .find_slice(&uow, "findByAge", &[Arg::value(10)], &PageRequest::of(1, 3).unwrap())
        .await
        .unwrap();
    assert_eq!(last.number_of_elements(), 2);
    assert!(!last.has_next());
    assert_eq!(store.executor().stats().counts, 0);
}

#[tokio::test]
async fn test_default_sort_applies_without_request_sort() {
    let store = common::store();
    common::seed(&store, &[("m3", 10, None), ("m1", 10, None), ("m2", 10, None)]).await;
    let members = common::members(&store);
    let uow = store.begin().await.unwrap();

    let page = members
        .find_page(&uow, "findByAge", &[Arg::value(10)], &PageRequest::of(0, 2).unwrap())
        .await
        .unwrap();
    assert_eq!(common::usernames(page.content()), vec!["m1", "m2"]);
}

#[tokio::test]
async fn test_spec_and_projected_pages() {
    let store = common::store();
    common::seed(
        &store,
        &[("m1", 10, None), ("m2", 20, None), ("m3", 30, None), ("m4", 40, None)],
    )
    .await;
    let members = common::members(&store);
    let uow = store.begin().await.unwrap();

    let page = members
        .find_page_by_spec(
            &uow,
            &AGE.greater_than(15),
            &PageRequest::sorted_by(0, 2, Sort::desc("age")).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(common::ages(page.content()), vec![40, 30]);
    assert_eq!(page.total_elements(), 3);

    let projected = members
        .find_projected_page::<UsernameOnly>(
            &uow,
            "findByAgeGreaterThanEqual",
            &[Arg::value(0)],
            &PageRequest::of(1, 3).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(projected.content(), &[UsernameOnly { username: "m4".into() }]);
    assert_eq!(projected.total_elements(), 4);
}

#[tokio::test]
async fn test_invalid_page_requests() {
    assert!(matches!(PageRequest::of(0, 0), Err(RepoError::Configuration(_))));
    assert!(matches!(PageRequest::of(-1, 5), Err(RepoError::Configuration(_))));

    let store = common::store_with(RepositoryConfig::new().max_page_size(2));
    let members = common::members(&store);
    let uow = store.begin().await.unwrap();
    let err = members
        .find_page(&uow, "findByAge", &[Arg::value(10)], &PageRequest::of(0, 3).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::Configuration(_)));
}

#[tokio::test]
async fn test_top_caps_page_total() {
    let store = common::store();
    common::seed(&store, &[("m1", 10, None), ("m2", 20, None), ("m3", 30, None)]).await;
    let members = common::members(&store);
    let uow = store.begin().await.unwrap();

    let top = members.find(&uow, "findTop2ByOrderByAgeDesc", &[]).await.unwrap();
    assert_eq!(common::ages(&top), vec![30, 20]);

    let page = members
        .find_page(&uow, "findTop2ByOrderByAgeDesc", &[], &PageRequest::of(0, 5).unwrap())
        .await
        .unwrap();
    assert_eq!(page.number_of_elements(), 2);
    assert_eq!(page.total_elements(), 2);
}

#[tokio::test]
async fn test_top_bounds_later_pages() {
    let store = common::store();
    common::seed(
        &store,
        &[
            ("m1", 10, None),
            ("m2", 20, None),
            ("m3", 30, None),
            ("m4", 40, None),
            ("m5", 50, None),
        ],
    )
    .await;
    let members = common::members(&store);
    let uow = store.begin().await.unwrap();

    let page = members
        .find_page(&uow, "findTop2ByOrderByAgeDesc", &[], &PageRequest::of(1, 2).unwrap())
        .await
        .unwrap();
    assert!(page.content().is_empty());
    assert_eq!(page.total_elements(), 2);
    assert!(!page.has_next());

    let slice = members
        .find_slice(&uow, "findTop2ByOrderByAgeDesc", &[], &PageRequest::of(1, 1).unwrap())
        .await
        .unwrap();
    assert_eq!(common::ages(slice.content()), vec![40]);
    assert!(!slice.has_next());
}
