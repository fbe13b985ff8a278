#![forbid(unsafe_code)]

use certus_contracts::certificate::{FileRef, Fingerprint};
use certus_contracts::registry::{OriginalRecord, OriginalRecordId};
use certus_contracts::UnixTimeMs;
use certus_storage::repo::{LedgerHealthRepo, OriginalRecordRepo};
use certus_storage::{LedgerStore, StorageError};

fn original(id: &str, fingerprint: &str) -> OriginalRecord {
    OriginalRecord::v1(
        OriginalRecordId::new(id).unwrap(),
        Fingerprint::parse(fingerprint).unwrap(),
        "BSc Diploma".to_string(),
        FileRef::new(format!("registry:{id}.pdf")).unwrap(),
        UnixTimeMs(1),
    )
    .unwrap()
}

#[test]
fn at_registry_db_01_lookup_by_fingerprint() {
    let s = LedgerStore::new_in_memory();
    s.insert_original_row(original("orig_1", "abc123")).unwrap();

    let hit = s
        .original_row_by_fingerprint(&Fingerprint::parse("ABC123").unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(hit.original_id.as_str(), "orig_1");
    assert!(s
        .original_row_by_fingerprint(&Fingerprint::parse("xyz999").unwrap())
        .unwrap()
        .is_none());
}

#[test]
fn at_registry_db_02_fingerprint_is_unique() {
    let s = LedgerStore::new_in_memory();
    s.insert_original_row(original("orig_1", "abc123")).unwrap();
    let err = s
        .insert_original_row(original("orig_2", "abc123"))
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::DuplicateKey {
            table: "original_records.fingerprint",
            ..
        }
    ));
    assert_eq!(s.table_counts().unwrap().original_records, 1);
}
