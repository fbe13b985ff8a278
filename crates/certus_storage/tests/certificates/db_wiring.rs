#![forbid(unsafe_code)]

use std::sync::{Arc, Barrier};
use std::thread;

use certus_contracts::certificate::{
    CertificateId, CertificateRecord, CertificateStatus, FileRef, Fingerprint, ListScope,
    StoredFileMeta,
};
use certus_contracts::identity::{EmailAddress, Role, UserId, UserRecord};
use certus_contracts::UnixTimeMs;
use certus_storage::repo::{CertificateRepo, IdentityRepo};
use certus_storage::{LedgerStore, StatusWrite, StorageError};

fn uid(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

fn cid(id: &str) -> CertificateId {
    CertificateId::new(id).unwrap()
}

fn store_with_users() -> LedgerStore {
    let s = LedgerStore::new_in_memory();
    for (id, email, role) in [
        ("usr_owner", "owner@example.com", Role::User),
        ("usr_other", "other@example.com", Role::User),
        ("usr_admin", "admin@example.com", Role::Admin),
    ] {
        s.insert_user_row(
            UserRecord::v1(
                uid(id),
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
    s
}

fn cert(id: &str, owner: &str, uploaded_at: u64) -> CertificateRecord {
    CertificateRecord::pending_v1(
        cid(id),
        uid(owner),
        format!("Title {id}"),
        String::new(),
        FileRef::new(format!("mem:{id}.pdf")).unwrap(),
        StoredFileMeta {
            file_name: format!("{id}.pdf"),
            content_type: Some("application/pdf".to_string()),
            size_bytes: 10,
        },
        Fingerprint::parse("abc123").unwrap(),
        UnixTimeMs(uploaded_at),
    )
    .unwrap()
}

#[test]
fn at_certificate_db_01_owner_must_exist() {
    let s = store_with_users();
    let err = s
        .insert_certificate_row(cert("cert_1", "usr_ghost", 5))
        .unwrap_err();
    assert!(matches!(err, StorageError::ForeignKeyViolation { .. }));
}

#[test]
fn at_certificate_db_02_scoped_listing_is_newest_first_and_owner_only() {
    let s = store_with_users();
    s.insert_certificate_row(cert("cert_1", "usr_owner", 10)).unwrap();
    s.insert_certificate_row(cert("cert_2", "usr_other", 20)).unwrap();
    s.insert_certificate_row(cert("cert_3", "usr_owner", 30)).unwrap();

    let owned: Vec<String> = s
        .certificate_rows_in_scope(&ListScope::OwnedBy(uid("usr_owner")))
        .unwrap()
        .into_iter()
        .map(|c| c.certificate_id.as_str().to_string())
        .collect();
    assert_eq!(owned, vec!["cert_3", "cert_1"]);

    let all = s.certificate_rows_in_scope(&ListScope::All).unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].certificate_id, cid("cert_3"));

    assert!(s
        .certificate_rows_in_scope(&ListScope::OwnedBy(uid("usr_admin")))
        .unwrap()
        .is_empty());
}

#[test]
fn at_certificate_db_03_cas_applies_once_then_reports_terminal() {
    let s = store_with_users();
    s.insert_certificate_row(cert("cert_1", "usr_owner", 10)).unwrap();

    let first = s
        .compare_and_set_status_row(
            &cid("cert_1"),
            CertificateStatus::Verified,
            UnixTimeMs(20),
            &uid("usr_admin"),
        )
        .unwrap();
    assert!(first.was_applied());
    assert_eq!(first.record().verified_by, Some(uid("usr_admin")));

    let second = s
        .compare_and_set_status_row(
            &cid("cert_1"),
            CertificateStatus::Rejected,
            UnixTimeMs(30),
            &uid("usr_admin"),
        )
        .unwrap();
    match second {
        StatusWrite::AlreadyTerminal(record) => {
            assert_eq!(record.status, CertificateStatus::Verified);
            assert_eq!(record.verified_at, Some(UnixTimeMs(20)));
        }
        other => panic!("expected terminal row, got {other:?}"),
    }
}

#[test]
fn at_certificate_db_04_cas_on_missing_row_is_not_found() {
    let s = store_with_users();
    let err = s
        .compare_and_set_status_row(
            &cid("cert_missing"),
            CertificateStatus::Rejected,
            UnixTimeMs(30),
            &uid("usr_admin"),
        )
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

#[test]
fn at_certificate_db_05_concurrent_cas_has_exactly_one_winner() {
    let s = Arc::new(store_with_users());
    s.insert_certificate_row(cert("cert_1", "usr_owner", 10)).unwrap();

    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let s = Arc::clone(&s);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let status = if i % 2 == 0 {
                    CertificateStatus::Verified
                } else {
                    CertificateStatus::Rejected
                };
                barrier.wait();
                s.compare_and_set_status_row(
                    &cid("cert_1"),
                    status,
                    UnixTimeMs(100 + i),
                    &uid("usr_admin"),
                )
                .unwrap()
            })
        })
        .collect();

    let writes: Vec<StatusWrite> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(writes.iter().filter(|w| w.was_applied()).count(), 1);

    let stored = s.certificate_row(&cid("cert_1")).unwrap().unwrap();
    for write in &writes {
        assert_eq!(write.record().status, stored.status);
        assert_eq!(write.record().verified_at, stored.verified_at);
    }
}
