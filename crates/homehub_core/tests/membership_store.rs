use homehub_core::db::open_db_in_memory;
use homehub_core::{FamilyId, MembershipStore, RepoError, SqliteMembershipStore};

#[test]
fn registered_principal_is_found_case_insensitively() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteMembershipStore::new(&conn);

    let family = store.register_family("F1").unwrap();
    let created = store
        .register_principal(" A@Fam1.com ", Some(family.family_id))
        .unwrap();
    assert_eq!(created.email, "a@fam1.com");

    let loaded = store.lookup_principal("a@FAM1.com").unwrap().unwrap();
    assert_eq!(loaded, created);
    assert_eq!(loaded.family_id, Some(family.family_id));
}

#[test]
fn missing_records_are_none_not_errors() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteMembershipStore::new(&conn);

    assert!(store.lookup_principal("ghost@nowhere.com").unwrap().is_none());
    assert!(store.lookup_principal("not an email").unwrap().is_none());
    assert!(store.lookup_device("thermostat-1").unwrap().is_none());
    assert!(store.get_family(FamilyId(42)).unwrap().is_none());
}

#[test]
fn principal_without_family_keeps_absent_reference() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteMembershipStore::new(&conn);

    store.register_principal("loner@example.com", None).unwrap();
    let loaded = store.lookup_principal("loner@example.com").unwrap().unwrap();
    assert_eq!(loaded.family_id, None);
}

#[test]
fn duplicate_principal_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteMembershipStore::new(&conn);

    store.register_principal("a@fam1.com", None).unwrap();
    let err = store.register_principal("A@fam1.com", None).unwrap_err();
    assert!(matches!(err, RepoError::DuplicatePrincipal(email) if email == "a@fam1.com"));
}

#[test]
fn principal_in_unknown_family_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteMembershipStore::new(&conn);

    let err = store
        .register_principal("a@fam1.com", Some(FamilyId(99)))
        .unwrap_err();
    assert!(matches!(err, RepoError::FamilyNotFound(FamilyId(99))));
}

#[test]
fn invalid_email_and_blank_family_name_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteMembershipStore::new(&conn);

    assert!(matches!(
        store.register_principal("nope", None).unwrap_err(),
        RepoError::InvalidEmail(_)
    ));
    assert!(matches!(
        store.register_family("   ").unwrap_err(),
        RepoError::InvalidData(_)
    ));
}

#[test]
fn families_with_same_name_get_distinct_ids() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteMembershipStore::new(&conn);

    let first = store.register_family("Smith").unwrap();
    let second = store.register_family("Smith").unwrap();
    assert_ne!(first.family_id, second.family_id);
    assert_eq!(
        store.get_family(second.family_id).unwrap().unwrap(),
        second
    );
}
