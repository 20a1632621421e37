mod common;

use memorepo::query::Arg;
use memorepo::sample::Member;
use memorepo::{LockMode, MethodOptions, RepoError, Repository, RepositoryConfig, Store};
use std::time::Duration;

fn locking(store: &Store) -> Repository<Member> {
    store
        .repository::<Member>()
        .method_with(
            "findByUsername",
            MethodOptions::new().lock(LockMode::PessimisticWrite),
        )
        .method_with(
            "readByUsername",
            MethodOptions::new().lock(LockMode::PessimisticRead),
        )
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_write_lock_conflict_fails_fast() {
    let store = common::store();
    common::seed(&store, &[("m1", 10, None)]).await;
    let members = locking(&store);

    let holder = store.begin().await.unwrap();
    members
        .find(&holder, "findByUsername", &[Arg::value("m1")])
        .await
        .unwrap();
    assert_eq!(store.executor().locks_held(holder.id()).unwrap(), 1);

    let other = store.begin().await.unwrap();
    let err = members
        .find(&other, "findByUsername", &[Arg::value("m1")])
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::LockAcquisition { ref entity, .. } if entity == "Member"));
    assert!(err.is_lock_failure());

    holder.commit().await.unwrap();
    assert_eq!(store.executor().locks_held(holder.id()).unwrap(), 0);
    let found = members
        .find(&other, "findByUsername", &[Arg::value("m1")])
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
}

#[tokio::test]
async fn test_lock_wait_times_out() {
    let store = common::store();
    common::seed(&store, &[("m1", 10, None)]).await;
    let members = locking(&store);

    let holder = store.begin().await.unwrap();
    members
        .find(&holder, "findByUsername", &[Arg::value("m1")])
        .await
        .unwrap();

    let patient = store
        .begin_with(RepositoryConfig::new().lock_timeout(Duration::from_millis(30)))
        .await
        .unwrap();
    let err = members
        .find(&patient, "findByUsername", &[Arg::value("m1")])
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::LockTimeout { waited_ms, .. } if waited_ms >= 30));
}

#[tokio::test]
async fn test_shared_locks_coexist_but_block_writers() {
    let store = common::store();
    let keys = common::seed(&store, &[("m1", 10, None)]).await;
    let members = locking(&store);

    let first = store.begin().await.unwrap();
    let second = store.begin().await.unwrap();
    members.find(&first, "readByUsername", &[Arg::value("m1")]).await.unwrap();
    members.find(&second, "readByUsername", &[Arg::value("m1")]).await.unwrap();

    let writer = store.begin().await.unwrap();
    let member = writer.find_required::<Member>(keys[0]).await.unwrap();
    member.write().unwrap().age = 11;
    let err = writer.flush().await.unwrap_err();
    assert!(err.is_lock_failure());

    first.rollback().await.unwrap();
    second.rollback().await.unwrap();
    member.write().unwrap().age = 12;
    assert_eq!(writer.flush().await.unwrap(), 1);
}

#[tokio::test]
async fn test_failed_flush_keeps_staged_removals() {
    let store = common::store();
    let keys = common::seed(&store, &[("m1", 10, None), ("m2", 20, None)]).await;
    let members = locking(&store);

    let holder = store.begin().await.unwrap();
    members
        .find(&holder, "findByUsername", &[Arg::value("m1")])
        .await
        .unwrap();

    let writer = store.begin().await.unwrap();
    let kept = writer.find_required::<Member>(keys[0]).await.unwrap();
    let doomed = writer.find_required::<Member>(keys[1]).await.unwrap();
    kept.write().unwrap().age = 11;
    writer.remove(&doomed).unwrap();
    assert!(writer.flush().await.unwrap_err().is_lock_failure());

    holder.commit().await.unwrap();
    writer.commit().await.unwrap();

    let check = store.begin().await.unwrap();
    let left = common::members(&store).find_all(&check).await.unwrap();
    assert_eq!(common::usernames(&left), vec!["m1"]);
    assert_eq!(common::ages(&left), vec![11]);
}
