#![forbid(unsafe_code)]

pub mod certificates;
pub mod clock;
pub mod error;
pub mod identity;
pub mod ids;
pub mod registry;
pub mod upload;
pub mod verification;

use std::sync::Arc;

use certus_engines::file_rules::{UploadRules, UploadRulesConfig};
use certus_engines::password::{PasswordHasher, PasswordHasherConfig};
use certus_engines::token::{TokenConfig, TokenSigner};
use certus_storage::repo::{CertificateRepo, IdentityRepo, LedgerHealthRepo, OriginalRecordRepo};
use certus_storage::{StorageGateway, TableCounts};

pub use error::{CoreError, ErrorKind};

use crate::certificates::CertificateLedger;
use crate::clock::Clock;
use crate::identity::IdentityLedger;
use crate::registry::AssetRegistry;
use crate::upload::UploadService;
use crate::verification::VerificationEngine;

#[derive(Clone)]
pub struct CoreConfig {
    pub password: PasswordHasherConfig,
    pub token: TokenConfig,
    pub token_secret: Vec<u8>,
    pub upload: UploadRulesConfig,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("password", &self.password)
            .field("token", &self.token)
            .field("token_secret", &"<redacted>")
            .field("upload", &self.upload)
            .finish()
    }
}

/// All services, wired once over one store, one gateway and one clock.
#[derive(Clone)]
pub struct CoreServices {
    pub identity: Arc<IdentityLedger>,
    pub certificates: Arc<CertificateLedger>,
    pub registry: Arc<AssetRegistry>,
    pub verification: Arc<VerificationEngine>,
    pub uploads: Arc<UploadService>,
    health: Arc<dyn LedgerHealthRepo>,
    clock: Arc<dyn Clock>,
}

impl CoreServices {
    pub fn wire<S>(
        store: Arc<S>,
        gateway: Arc<dyn StorageGateway>,
        clock: Arc<dyn Clock>,
        config: CoreConfig,
    ) -> Result<Self, CoreError>
    where
        S: IdentityRepo + CertificateRepo + OriginalRecordRepo + LedgerHealthRepo + 'static,
    {
        let hasher = PasswordHasher::new(config.password)
            .map_err(|err| CoreError::validation(format!("password hasher config: {err}")))?;
        let signer = TokenSigner::new(&config.token_secret, config.token)
            .map_err(|err| CoreError::validation(format!("token signer config: {err}")))?;

        let identity = Arc::new(IdentityLedger::new(
            store.clone(),
            hasher,
            signer,
            clock.clone(),
        ));
        let certificates = Arc::new(CertificateLedger::new(
            store.clone(),
            store.clone(),
            clock.clone(),
        ));
        let registry = Arc::new(AssetRegistry::new(store.clone(), clock.clone()));
        let verification = Arc::new(VerificationEngine::new(
            certificates.clone(),
            registry.clone(),
        ));
        let uploads = Arc::new(UploadService::new(
            certificates.clone(),
            gateway,
            UploadRules::new(config.upload),
        ));
        Ok(Self {
            identity,
            certificates,
            registry,
            verification,
            uploads,
            health: store,
            clock,
        })
    }

    pub fn table_counts(&self) -> Result<TableCounts, CoreError> {
        Ok(self.health.table_counts()?)
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use certus_contracts::certificate::{
        CertificateId, CertificateStatus, FileRef, Fingerprint, ListScope, OwnerRef,
        RequestedVerdict, StoredFileMeta,
    };
    use certus_contracts::identity::{Claims, EmailAddress};
    use certus_contracts::verdict::VerdictReason;
    use certus_contracts::UnixTimeMs;
    use certus_storage::gateway::{fingerprint_bytes, InMemoryGateway};
    use certus_storage::LedgerStore;

    use super::*;
    use crate::certificates::NewCertificate;
    use crate::clock::FixedClock;
    use crate::upload::UploadRequest;

    const DIPLOMA: &[u8] = b"%PDF-1.4 BSc Diploma, Example University";

    struct Fixture {
        core: CoreServices,
        gateway: Arc<InMemoryGateway>,
        clock: Arc<FixedClock>,
        admin: Claims,
        alice: Claims,
        bob: Claims,
    }

    fn config() -> CoreConfig {
        CoreConfig {
            password: PasswordHasherConfig {
                rounds: 1_000,
                salt_len: 16,
            },
            token: TokenConfig::mvp_v1(),
            token_secret: vec![9u8; 32],
            upload: UploadRulesConfig::mvp_v1(),
        }
    }

    fn fixture_with_store(store: Arc<LedgerStore>) -> Fixture {
        let gateway = Arc::new(InMemoryGateway::new());
        let clock = Arc::new(FixedClock::at(UnixTimeMs(1_700_000_000_000)));
        let core = CoreServices::wire(store, gateway.clone(), clock.clone(), config()).unwrap();
        core.identity
            .bootstrap_admin("Admin", "admin@example.com", "adminpw")
            .unwrap();
        core.identity
            .register("Alice", "alice@example.com", "alicepw")
            .unwrap();
        core.identity
            .register("Bob", "bob@example.com", "bobpw")
            .unwrap();
        let login = |email: &str, pw: &str| core.identity.authenticate(email, pw).unwrap().claims;
        let admin = login("admin@example.com", "adminpw");
        let alice = login("alice@example.com", "alicepw");
        let bob = login("bob@example.com", "bobpw");
        Fixture {
            core,
            gateway,
            clock,
            admin,
            alice,
            bob,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_store(Arc::new(LedgerStore::new_in_memory()))
    }

    fn upload(f: &Fixture, who: &Claims, bytes: &[u8]) -> CertificateId {
        f.clock.advance_ms(1);
        f.core
            .uploads
            .upload(
                who,
                UploadRequest {
                    title: "BSc Diploma".to_string(),
                    description: Some("class of 2020".to_string()),
                    file_name: "diploma.pdf".to_string(),
                    content_type: None,
                    bytes: bytes.to_vec(),
                },
            )
            .unwrap()
            .certificate_id
    }

    /// Certificate whose fingerprint is set directly, for the registry examples.
    fn submit_with_fingerprint(f: &Fixture, fingerprint: &str) -> CertificateId {
        f.clock.advance_ms(1);
        let id = crate::ids::new_certificate_id().unwrap();
        f.core
            .certificates
            .submit(
                &OwnerRef::ByEmail(EmailAddress::parse("alice@example.com").unwrap()),
                id.clone(),
                NewCertificate {
                    title: "BSc Diploma".to_string(),
                    description: String::new(),
                    file_ref: FileRef::new(format!("mem:{}", id.as_str())).unwrap(),
                    fingerprint: Fingerprint::parse(fingerprint).unwrap(),
                    file: StoredFileMeta {
                        file_name: "diploma.pdf".to_string(),
                        content_type: None,
                        size_bytes: 1,
                    },
                },
            )
            .unwrap();
        id
    }

    #[test]
    fn at_os_01_registry_match_verifies_and_miss_rejects() {
        let f = fixture();
        f.core
            .registry
            .register_original(&f.admin, "abc123", "BSc Diploma", "registry:bsc.pdf")
            .unwrap();
        let matching = submit_with_fingerprint(&f, "abc123");
        let unmatched = submit_with_fingerprint(&f, "xyz999");

        let verified = f
            .core
            .verification
            .adjudicate(&f.admin, &matching, RequestedVerdict::Verify)
            .unwrap();
        assert!(verified.applied);
        assert_eq!(verified.certificate.status, CertificateStatus::Verified);
        assert_eq!(verified.certificate.verified_by, Some(f.admin.user_id.clone()));
        assert!(matches!(
            verified.reason,
            VerdictReason::MatchedOriginal { ref original_title, .. } if original_title == "BSc Diploma"
        ));

        let rejected = f
            .core
            .verification
            .adjudicate(&f.admin, &unmatched, RequestedVerdict::Verify)
            .unwrap();
        assert!(rejected.applied);
        assert_eq!(rejected.certificate.status, CertificateStatus::Rejected);
        assert_eq!(rejected.reason, VerdictReason::NoRegistryMatch);
        assert!(rejected.certificate.verified_at.is_some());
    }

    #[test]
    fn at_os_02_reject_request_ignores_registry() {
        let f = fixture();
        f.core
            .registry
            .register_original(&f.admin, "abc123", "BSc Diploma", "registry:bsc.pdf")
            .unwrap();
        let id = submit_with_fingerprint(&f, "abc123");
        let outcome = f
            .core
            .verification
            .adjudicate(&f.admin, &id, RequestedVerdict::Reject)
            .unwrap();
        assert_eq!(outcome.certificate.status, CertificateStatus::Rejected);
        assert_eq!(outcome.reason, VerdictReason::RejectedByAdjudicator);
        assert_eq!(outcome.certificate.verified_by, Some(f.admin.user_id.clone()));
    }

    #[test]
    fn at_os_03_terminal_verdict_survives_registry_changes() {
        let f = fixture();
        let id = submit_with_fingerprint(&f, "xyz999");
        let first = f
            .core
            .verification
            .adjudicate(&f.admin, &id, RequestedVerdict::Verify)
            .unwrap();
        assert_eq!(first.certificate.status, CertificateStatus::Rejected);

        f.core
            .registry
            .register_original(&f.admin, "xyz999", "Late Entry", "registry:late.pdf")
            .unwrap();
        f.clock.advance_ms(1_000);
        let again = f
            .core
            .verification
            .adjudicate(&f.admin, &id, RequestedVerdict::Verify)
            .unwrap();
        assert!(!again.applied);
        assert_eq!(again.certificate, first.certificate);
        assert_eq!(
            again.reason,
            VerdictReason::AlreadyAdjudicated {
                status: CertificateStatus::Rejected
            }
        );
    }

    #[test]
    fn at_os_04_concurrent_verdicts_write_once() {
        let f = fixture();
        f.core
            .registry
            .register_original(&f.admin, "abc123", "BSc Diploma", "registry:bsc.pdf")
            .unwrap();
        let id = submit_with_fingerprint(&f, "abc123");

        let barrier = Arc::new(Barrier::new(6));
        let outcomes: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = (0..6)
                .map(|i| {
                    let barrier = Arc::clone(&barrier);
                    let (core, admin, id) = (&f.core, &f.admin, &id);
                    s.spawn(move || {
                        let requested = if i % 2 == 0 {
                            RequestedVerdict::Verify
                        } else {
                            RequestedVerdict::Reject
                        };
                        barrier.wait();
                        core.verification.adjudicate(admin, id, requested).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(outcomes.iter().filter(|o| o.applied).count(), 1);
        let stored = f.core.certificates.get(&id).unwrap();
        for outcome in &outcomes {
            assert_eq!(outcome.certificate, stored);
        }
    }

    #[test]
    fn at_os_05_access_rules_for_reads_lists_and_admin_ops() {
        let f = fixture();
        let alices = upload(&f, &f.alice, DIPLOMA);
        upload(&f, &f.bob, b"bob's transcript");

        assert!(f.core.certificates.read_for(&f.alice, &alices).is_ok());
        assert!(f.core.certificates.read_for(&f.admin, &alices).is_ok());
        assert!(matches!(
            f.core.certificates.read_for(&f.bob, &alices),
            Err(CoreError::Unauthorized(_))
        ));

        let alice_list = f.core.certificates.list_for(&f.alice).unwrap();
        assert_eq!(alice_list.len(), 1);
        assert_eq!(alice_list[0].certificate_id, alices);
        assert_eq!(f.core.certificates.list_for(&f.admin).unwrap().len(), 2);

        assert!(matches!(
            f.core
                .verification
                .adjudicate(&f.alice, &alices, RequestedVerdict::Verify),
            Err(CoreError::Unauthorized(_))
        ));
        assert!(matches!(
            f.core.certificates.list_all_with_owners(&f.bob),
            Err(CoreError::Unauthorized(_))
        ));
        assert_eq!(
            f.core.certificates.get(&alices).unwrap().status,
            CertificateStatus::Pending
        );
    }

    #[test]
    fn at_os_06_upload_fingerprints_persisted_bytes() {
        let f = fixture();
        let id = upload(&f, &f.alice, DIPLOMA);
        let record = f.core.certificates.get(&id).unwrap();
        assert_eq!(record.fingerprint, fingerprint_bytes(DIPLOMA).unwrap());
        assert_eq!(record.file.size_bytes, DIPLOMA.len() as u64);
        assert_eq!(record.file.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(record.status, CertificateStatus::Pending);
        assert!(record.file_ref.as_str().starts_with(&format!("mem:{}", id.as_str())));

        f.core
            .registry
            .register_original(
                &f.admin,
                record.fingerprint.as_str(),
                "BSc Diploma",
                "registry:bsc.pdf",
            )
            .unwrap();
        let outcome = f
            .core
            .verification
            .adjudicate(&f.admin, &id, RequestedVerdict::Verify)
            .unwrap();
        assert_eq!(outcome.certificate.status, CertificateStatus::Verified);
    }

    #[test]
    fn at_os_07_bad_uploads_store_nothing() {
        let f = fixture();
        let bad = |title: &str, name: &str, bytes: &[u8]| {
            f.core.uploads.upload(
                &f.alice,
                UploadRequest {
                    title: title.to_string(),
                    description: None,
                    file_name: name.to_string(),
                    content_type: None,
                    bytes: bytes.to_vec(),
                },
            )
        };
        assert!(matches!(bad("", "a.pdf", b"x"), Err(CoreError::Validation(_))));
        assert!(matches!(bad("T", "a.exe", b"x"), Err(CoreError::Validation(_))));
        assert!(matches!(bad("T", "a.pdf", b""), Err(CoreError::Validation(_))));
        assert_eq!(f.gateway.object_count(), 0);
        assert_eq!(f.core.table_counts().unwrap().certificates, 0);
    }

    #[test]
    fn at_os_08_failed_ledger_write_removes_stored_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let journal_path = dir.path().join("journal.jsonl");
        let store = Arc::new(LedgerStore::open_with_journal(&journal_path).unwrap());
        let f = fixture_with_store(store);

        std::fs::remove_file(&journal_path).unwrap();
        std::fs::create_dir(&journal_path).unwrap();

        let err = f
            .core
            .uploads
            .upload(
                &f.alice,
                UploadRequest {
                    title: "BSc Diploma".to_string(),
                    description: None,
                    file_name: "diploma.pdf".to_string(),
                    content_type: None,
                    bytes: DIPLOMA.to_vec(),
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert_eq!(f.gateway.object_count(), 0);
        assert_eq!(f.core.table_counts().unwrap().certificates, 0);
    }

    #[test]
    fn at_os_10_failed_verdict_write_leaves_certificate_pending() {
        let dir = tempfile::tempdir().unwrap();
        let journal_path = dir.path().join("journal.jsonl");
        let store = Arc::new(LedgerStore::open_with_journal(&journal_path).unwrap());
        let f = fixture_with_store(store);
        let id = upload(&f, &f.alice, DIPLOMA);

        std::fs::remove_file(&journal_path).unwrap();
        std::fs::create_dir(&journal_path).unwrap();

        let err = f
            .core
            .verification
            .adjudicate(&f.admin, &id, RequestedVerdict::Verify)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);

        let stored = f.core.certificates.get(&id).unwrap();
        assert_eq!(stored.status, CertificateStatus::Pending);
        assert_eq!(stored.verified_by, None);
        assert_eq!(stored.verified_at, None);
    }

    #[test]
    fn at_os_09_admin_listing_joins_owner_summary() {
        let f = fixture();
        let id = upload(&f, &f.alice, DIPLOMA);
        upload(&f, &f.bob, b"bob's transcript");
        let listed = f.core.certificates.list_all_with_owners(&f.admin).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[1].certificate.certificate_id, id);
        assert_eq!(listed[1].owner.as_ref().unwrap().name, "Alice");
        assert_eq!(listed[0].owner.as_ref().unwrap().name, "Bob");
        assert_eq!(
            f.core
                .certificates
                .list_by_scope(&ListScope::OwnedBy(f.bob.user_id.clone()))
                .unwrap()
                .len(),
            1
        );
    }
}
