mod common;

use memorepo::sample::{Member, Team};
use memorepo::{LockMode, MethodOptions, RepoError, Sort};

fn unresolvable(result: Result<memorepo::Repository<Member>, RepoError>) -> (String, String) {
    match result {
        Err(RepoError::UnresolvableQuery { method, reason }) => (method, reason),
        Err(other) => panic!("expected an unresolvable query, got {other}"),
        Ok(_) => panic!("expected the build to fail"),
    }
}

#[test]
fn test_grammar_errors_fail_at_build() {
    let store = common::store();

    for method in [
        "fetchByUsername",
        "findByUsernameAnd",
        "findByNickname",
        "findByTeamColor",
        "findBy",
        "findByUsernameOrderByShoeSizeAsc",
    ] {
        let (name, reason) = unresolvable(store.repository::<Member>().method(method).build());
        assert_eq!(name, method);
        assert!(!reason.is_empty());
    }
}

#[test]
fn test_top_without_ordering_fails_at_build() {
    let store = common::store();
    let (name, _) = unresolvable(store.repository::<Member>().method("findTop3ByAge").build());
    assert_eq!(name, "findTop3ByAge");

    assert!(store.repository::<Member>().method("findTop3ByAgeOrderByUsernameAsc").build().is_ok());
    assert!(
        store
            .repository::<Member>()
            .default_sort(Sort::desc("age"))
            .method("findFirstByAge")
            .build()
            .is_ok()
    );
}

#[test]
fn test_method_options_are_validated() {
    let store = common::store();

    let (name, _) = unresolvable(
        store
            .repository::<Member>()
            .method_with("findByAge", MethodOptions::new().fetch("club"))
            .build(),
    );
    assert_eq!(name, "findByAge");

    unresolvable(
        store
            .repository::<Member>()
            .method_with(
                "findByAge",
                MethodOptions::new().read_only().lock(LockMode::PessimisticWrite),
            )
            .build(),
    );

    let err = store
        .repository::<Member>()
        .method("findByAge")
        .method("findByAge")
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, RepoError::Configuration(_)));
}

#[test]
fn test_native_text_and_default_sort_are_checked() {
    let store = common::store();
    let (name, _) = unresolvable(
        store
            .repository::<Member>()
            .native_query_with_count("paged", "select * from member", "select count(* from member")
            .build(),
    );
    assert_eq!(name, "paged");

    assert!(
        store
            .repository::<Team>()
            .default_sort(Sort::asc("motto"))
            .build()
            .is_err()
    );
}
