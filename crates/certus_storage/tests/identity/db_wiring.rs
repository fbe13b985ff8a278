#![forbid(unsafe_code)]

use certus_contracts::identity::{EmailAddress, Role, UserId, UserRecord};
use certus_contracts::UnixTimeMs;
use certus_storage::repo::IdentityRepo;
use certus_storage::{LedgerStore, StorageError};

fn user(id: &str, email: &str, created_at: u64) -> UserRecord {
    UserRecord::v1(
        UserId::new(id).unwrap(),
        format!("User {id}"),
        EmailAddress::parse(email).unwrap(),
        "pbkdf2_sha256$1000$00$00".to_string(),
        Role::User,
        UnixTimeMs(created_at),
    )
    .unwrap()
}

#[test]
fn at_identity_db_01_email_is_unique_case_insensitively() {
    let s = LedgerStore::new_in_memory();
    s.insert_user_row(user("usr_a", "ada@example.com", 1)).unwrap();

    let err = s
        .insert_user_row(user("usr_b", "ADA@Example.com", 2))
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::DuplicateKey {
            table: "users.email",
            ..
        }
    ));
    assert_eq!(s.user_rows_newest_first().unwrap().len(), 1);
}

#[test]
fn at_identity_db_02_duplicate_user_id_is_refused() {
    let s = LedgerStore::new_in_memory();
    s.insert_user_row(user("usr_a", "a@example.com", 1)).unwrap();
    let err = s
        .insert_user_row(user("usr_a", "b@example.com", 2))
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::DuplicateKey { table: "users", .. }
    ));
}

#[test]
fn at_identity_db_03_lookup_by_email_and_id() {
    let s = LedgerStore::new_in_memory();
    s.insert_user_row(user("usr_a", "a@example.com", 1)).unwrap();

    let by_email = s
        .user_row_by_email(&EmailAddress::parse("A@EXAMPLE.COM").unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(by_email.user_id.as_str(), "usr_a");
    assert!(s
        .user_row(&UserId::new("usr_missing").unwrap())
        .unwrap()
        .is_none());
}

#[test]
fn at_identity_db_04_users_list_newest_first() {
    let s = LedgerStore::new_in_memory();
    s.insert_user_row(user("usr_a", "a@example.com", 10)).unwrap();
    s.insert_user_row(user("usr_b", "b@example.com", 30)).unwrap();
    s.insert_user_row(user("usr_c", "c@example.com", 20)).unwrap();

    let ids: Vec<String> = s
        .user_rows_newest_first()
        .unwrap()
        .into_iter()
        .map(|u| u.user_id.as_str().to_string())
        .collect();
    assert_eq!(ids, vec!["usr_b", "usr_c", "usr_a"]);
}
