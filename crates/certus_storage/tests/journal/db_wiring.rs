#![forbid(unsafe_code)]

use std::fs;

use certus_contracts::certificate::{
    CertificateId, CertificateRecord, CertificateStatus, FileRef, Fingerprint, ListScope,
    StoredFileMeta,
};
use certus_contracts::identity::{EmailAddress, Role, UserId, UserRecord};
use certus_contracts::registry::{OriginalRecord, OriginalRecordId};
use certus_contracts::UnixTimeMs;
use certus_storage::repo::{CertificateRepo, IdentityRepo, LedgerHealthRepo, OriginalRecordRepo};
use certus_storage::{LedgerStore, StorageError};

fn seed(s: &LedgerStore) {
    for (id, email, role) in [
        ("usr_owner", "owner@example.com", Role::User),
        ("usr_admin", "admin@example.com", Role::Admin),
    ] {
        s.insert_user_row(
            UserRecord::v1(
                UserId::new(id).unwrap(),
                id.to_string(),
                EmailAddress::parse(email).unwrap(),
                "pbkdf2_sha256$1000$00$00".to_string(),
                role,
                UnixTimeMs(1),
            )
            .unwrap(),
        )
        .unwrap();
    }
    s.insert_certificate_row(
        CertificateRecord::pending_v1(
            CertificateId::new("cert_1").unwrap(),
            UserId::new("usr_owner").unwrap(),
            "BSc Diploma".to_string(),
            "final transcript".to_string(),
            FileRef::new("mem:cert_1.pdf").unwrap(),
            StoredFileMeta {
                file_name: "diploma.pdf".to_string(),
                content_type: None,
                size_bytes: 3,
            },
            Fingerprint::parse("abc123").unwrap(),
            UnixTimeMs(5),
        )
        .unwrap(),
    )
    .unwrap();
    s.insert_original_row(
        OriginalRecord::v1(
            OriginalRecordId::new("orig_1").unwrap(),
            Fingerprint::parse("abc123").unwrap(),
            "BSc Diploma".to_string(),
            FileRef::new("registry:bsc.pdf").unwrap(),
            UnixTimeMs(2),
        )
        .unwrap(),
    )
    .unwrap();
    s.compare_and_set_status_row(
        &CertificateId::new("cert_1").unwrap(),
        CertificateStatus::Verified,
        UnixTimeMs(9),
        &UserId::new("usr_admin").unwrap(),
    )
    .unwrap();
}

#[test]
fn at_journal_01_reopen_replays_every_committed_write() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger").join("journal.jsonl");

    {
        let s = LedgerStore::open_with_journal(&path).unwrap();
        assert!(s.is_durable());
        seed(&s);
    }

    let lines = fs::read_to_string(&path).unwrap().lines().count();
    assert_eq!(lines, 5);

    let reopened = LedgerStore::open_with_journal(&path).unwrap();
    let counts = reopened.table_counts().unwrap();
    assert_eq!(counts.users, 2);
    assert_eq!(counts.certificates, 1);
    assert_eq!(counts.original_records, 1);

    let cert = reopened
        .certificate_rows_in_scope(&ListScope::All)
        .unwrap()
        .remove(0);
    assert_eq!(cert.status, CertificateStatus::Verified);
    assert_eq!(cert.verified_at, Some(UnixTimeMs(9)));
    assert_eq!(cert.description, "final transcript");
}

#[test]
fn at_journal_02_refused_writes_are_not_journaled() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.jsonl");
    let s = LedgerStore::open_with_journal(&path).unwrap();
    seed(&s);

    let dup = UserRecord::v1(
        UserId::new("usr_dup").unwrap(),
        "dup".to_string(),
        EmailAddress::parse("OWNER@example.com").unwrap(),
        "pbkdf2_sha256$1000$00$00".to_string(),
        Role::User,
        UnixTimeMs(3),
    )
    .unwrap();
    assert!(s.insert_user_row(dup).is_err());

    let second_verdict = s
        .compare_and_set_status_row(
            &CertificateId::new("cert_1").unwrap(),
            CertificateStatus::Rejected,
            UnixTimeMs(10),
            &UserId::new("usr_admin").unwrap(),
        )
        .unwrap();
    assert!(!second_verdict.was_applied());

    assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 5);
}

#[test]
fn at_journal_03_unknown_schema_version_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.jsonl");
    fs::write(
        &path,
        "{\"schema_version\":9,\"entry\":{\"kind\":\"user_inserted\",\"record\":null}}\n",
    )
    .unwrap();
    let err = LedgerStore::open_with_journal(&path).unwrap_err();
    assert!(matches!(err, StorageError::Journal(_)));
}

#[test]
fn at_journal_04_corrupt_line_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.jsonl");
    fs::write(&path, "not json\n").unwrap();
    assert!(matches!(
        LedgerStore::open_with_journal(&path),
        Err(StorageError::Journal(_))
    ));
}
