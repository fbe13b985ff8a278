#![forbid(unsafe_code)]

use certus_contracts::certificate::FileRef;
use certus_storage::gateway::{
    fingerprint_bytes, store_and_fingerprint, GatewayError, LocalDiskGateway, StorageGateway,
};

#[test]
fn at_local_gateway_01_store_read_back_and_fingerprint() {
    let dir = tempfile::tempdir().unwrap();
    let gw = LocalDiskGateway::open(dir.path().join("uploads")).unwrap();

    let blob = store_and_fingerprint(&gw, "cert_1.pdf", b"%PDF-1.4 diploma").unwrap();
    assert_eq!(blob.file_ref.as_str(), "local:cert_1.pdf");
    assert_eq!(blob.size_bytes, 16);
    assert_eq!(blob.fingerprint, fingerprint_bytes(b"%PDF-1.4 diploma").unwrap());
    assert!(gw.root().join("cert_1.pdf").exists());
    assert!(!gw.root().join("cert_1.pdf.partial").exists());
}

#[test]
fn at_local_gateway_02_existing_keys_are_not_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let gw = LocalDiskGateway::open(dir.path()).unwrap();
    gw.put("cert_1.pdf", b"first").unwrap();
    assert!(matches!(
        gw.put("cert_1.pdf", b"second"),
        Err(GatewayError::AlreadyExists(_))
    ));
    let file_ref = FileRef::new("local:cert_1.pdf").unwrap();
    assert_eq!(gw.read(&file_ref).unwrap(), b"first");
}

#[test]
fn at_local_gateway_03_delete_then_read_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let gw = LocalDiskGateway::open(dir.path()).unwrap();
    let file_ref = gw.put("cert_1.pdf", b"bytes").unwrap();
    gw.delete(&file_ref).unwrap();
    assert!(matches!(gw.read(&file_ref), Err(GatewayError::NotFound(_))));
    assert!(matches!(gw.delete(&file_ref), Err(GatewayError::NotFound(_))));
}

#[test]
fn at_local_gateway_04_path_traversal_refs_are_refused() {
    let dir = tempfile::tempdir().unwrap();
    let gw = LocalDiskGateway::open(dir.path()).unwrap();
    let sneaky = FileRef::new("local:../secret").unwrap();
    assert!(matches!(gw.read(&sneaky), Err(GatewayError::InvalidKey(_))));
}
