use expiry_core::db::open_db_in_memory;
use expiry_core::{
    Collection, CollectionKind, CollectionMember, DomainStore, ExpiryWindow, RepoError,
    SqliteDomainStore, DAY_MS, DISABLE_REMINDER_TAG,
};

const NOW: i64 = 19_675 * DAY_MS;

fn admins() -> Vec<String> {
    vec!["user.admin".to_string()]
}

#[test]
fn list_expiring_members_filters_window_kind_and_permanent_members() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDomainStore::try_new(&conn).unwrap();
    store.create_domain("sports", &admins()).unwrap();
    store
        .put_collection(&Collection::new("sports", CollectionKind::Role, "readers").with_members(
            vec![
                CollectionMember::expiring("user.past", NOW - 1),
                CollectionMember::expiring("user.soon", NOW + DAY_MS),
                CollectionMember::expiring("user.later", NOW + 40 * DAY_MS),
                CollectionMember::permanent("user.forever"),
            ],
        ))
        .unwrap();
    store
        .put_collection(
            &Collection::new("sports", CollectionKind::Group, "readers")
                .with_members(vec![CollectionMember::expiring("user.grouped", NOW + DAY_MS)]),
        )
        .unwrap();

    let window = ExpiryWindow {
        from_ms: NOW,
        until_ms: NOW + 29 * DAY_MS,
    };
    let roles = store
        .list_expiring_members(CollectionKind::Role, None, &window)
        .unwrap();
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0].member_name, "user.soon");
    assert_eq!(roles[0].collection_name, "readers");
    assert_eq!(roles[0].expiration_ms, NOW + DAY_MS);

    let groups = store
        .list_expiring_members(CollectionKind::Group, None, &window)
        .unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].kind, CollectionKind::Group);
}

#[test]
fn list_expiring_members_orders_by_domain_collection_and_expiration() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDomainStore::try_new(&conn).unwrap();
    for domain in ["weather", "news"] {
        store.create_domain(domain, &admins()).unwrap();
        store
            .put_collection(
                &Collection::new(domain, CollectionKind::Role, "writers").with_members(vec![
                    CollectionMember::expiring("user.b", NOW + 3 * DAY_MS),
                    CollectionMember::expiring("user.a", NOW + 5 * DAY_MS),
                    CollectionMember::expiring("user.c", NOW + 3 * DAY_MS),
                ]),
            )
            .unwrap();
    }

    let window = ExpiryWindow {
        from_ms: NOW,
        until_ms: NOW + 10 * DAY_MS,
    };
    let listed = store
        .list_expiring_members(CollectionKind::Role, None, &window)
        .unwrap()
        .into_iter()
        .map(|record| format!("{}/{}", record.domain_name, record.member_name))
        .collect::<Vec<_>>();
    assert_eq!(
        listed,
        vec![
            "news/user.b",
            "news/user.c",
            "news/user.a",
            "weather/user.b",
            "weather/user.c",
            "weather/user.a",
        ]
    );

    let filtered = store
        .list_expiring_members(CollectionKind::Role, Some("weather"), &window)
        .unwrap();
    assert_eq!(filtered.len(), 3);
    assert!(filtered.iter().all(|record| record.domain_name == "weather"));
}

#[test]
fn put_collection_replaces_members_and_tags() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDomainStore::try_new(&conn).unwrap();
    store.create_domain("sports", &admins()).unwrap();

    let first = Collection::new("sports", CollectionKind::Group, "devs")
        .with_members(vec![CollectionMember::expiring("user.old", NOW + DAY_MS)])
        .with_tag(DISABLE_REMINDER_TAG, vec!["3".to_string()])
        .with_tag("owner", vec!["team-a".to_string(), "team-b".to_string()]);
    store.put_collection(&first).unwrap();

    let tags = store
        .get_resource_tags("sports", CollectionKind::Group, "devs")
        .unwrap();
    assert_eq!(tags.get(DISABLE_REMINDER_TAG), Some(&vec!["3".to_string()]));
    assert_eq!(
        tags.get("owner"),
        Some(&vec!["team-a".to_string(), "team-b".to_string()])
    );

    let second = Collection::new("sports", CollectionKind::Group, "devs")
        .with_members(vec![CollectionMember::expiring("user.new", NOW + DAY_MS)]);
    store.put_collection(&second).unwrap();

    assert!(store
        .get_resource_tags("sports", CollectionKind::Group, "devs")
        .unwrap()
        .is_empty());
    let window = ExpiryWindow {
        from_ms: NOW,
        until_ms: NOW + 2 * DAY_MS,
    };
    let members = store
        .list_expiring_members(CollectionKind::Group, None, &window)
        .unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].member_name, "user.new");
}

#[test]
fn administrators_resolve_through_configured_role() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDomainStore::try_new(&conn).unwrap();
    store
        .create_domain(
            "sports",
            &["user.zed".to_string(), "user.amy".to_string()],
        )
        .unwrap();

    assert_eq!(
        store.get_administrators("sports", NOW).unwrap(),
        Some(vec!["user.amy".to_string(), "user.zed".to_string()])
    );
    assert_eq!(store.get_administrators("missing", NOW).unwrap(), None);

    let owners_store = SqliteDomainStore::try_new(&conn)
        .unwrap()
        .with_admin_role("owners");
    assert_eq!(owners_store.get_administrators("sports", NOW).unwrap(), None);
}

#[test]
fn administrators_exclude_expired_admin_memberships() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDomainStore::try_new(&conn).unwrap();
    store.create_domain("sports", &admins()).unwrap();
    store
        .put_collection(
            &Collection::new("sports", CollectionKind::Role, "admin").with_members(vec![
                CollectionMember::permanent("user.admin"),
                CollectionMember::expiring("user.formeradmin", NOW - 10 * DAY_MS),
                CollectionMember::expiring("user.tempadmin", NOW + DAY_MS),
            ]),
        )
        .unwrap();

    assert_eq!(
        store.get_administrators("sports", NOW).unwrap(),
        Some(vec!["user.admin".to_string(), "user.tempadmin".to_string()])
    );
    assert_eq!(
        store.get_administrators("sports", NOW + 2 * DAY_MS).unwrap(),
        Some(vec!["user.admin".to_string()])
    );
}

#[test]
fn undecodable_expiration_rows_are_skipped() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDomainStore::try_new(&conn).unwrap();
    store.create_domain("sports", &admins()).unwrap();
    store
        .put_collection(
            &Collection::new("sports", CollectionKind::Group, "devs")
                .with_members(vec![CollectionMember::expiring("user.joe", NOW + DAY_MS)]),
        )
        .unwrap();
    conn.execute(
        "INSERT INTO collection_members (collection_id, member_name, expiration)
         SELECT id, 'user.bad', ?1 FROM collections WHERE name = 'devs';",
        [(NOW + 2 * DAY_MS) as f64 + 0.5],
    )
    .unwrap();

    let window = ExpiryWindow {
        from_ms: NOW,
        until_ms: NOW + 30 * DAY_MS,
    };
    let records = store
        .list_expiring_members(CollectionKind::Group, None, &window)
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].member_name, "user.joe");
}

#[test]
fn writes_validate_input_and_domain_existence() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDomainStore::try_new(&conn).unwrap();

    let err = store
        .put_collection(&Collection::new("nowhere", CollectionKind::Role, "readers"))
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound(_)));

    store.create_domain("sports", &admins()).unwrap();
    let err = store.create_domain("sports", &admins()).unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));

    let err = store
        .put_collection(
            &Collection::new("sports", CollectionKind::Role, "readers")
                .with_members(vec![CollectionMember::permanent("user with space")]),
        )
        .unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
    assert!(!err.is_retryable());
}

#[test]
fn delete_domain_cascades_to_members() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDomainStore::try_new(&conn).unwrap();
    store.create_domain("sports", &admins()).unwrap();
    store
        .put_collection(
            &Collection::new("sports", CollectionKind::Role, "readers")
                .with_members(vec![CollectionMember::expiring("user.joe", NOW + DAY_MS)]),
        )
        .unwrap();

    store.delete_domain("sports").unwrap();

    let window = ExpiryWindow {
        from_ms: NOW,
        until_ms: NOW + 2 * DAY_MS,
    };
    assert!(store
        .list_expiring_members(CollectionKind::Role, None, &window)
        .unwrap()
        .is_empty());
    assert!(matches!(
        store.delete_domain("sports").unwrap_err(),
        RepoError::NotFound(_)
    ));
}
