#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use certus_contracts::certificate::{
    CertificateId, CertificateRecord, CertificateStatus, Fingerprint, ListScope,
};
use certus_contracts::identity::{EmailAddress, UserId, UserRecord};
use certus_contracts::registry::{OriginalRecord, OriginalRecordId};
use certus_contracts::{ContractViolation, UnixTimeMs, Validate};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("duplicate key in {table}: {key}")]
    DuplicateKey { table: &'static str, key: String },
    #[error("foreign key violation on {table}: {key}")]
    ForeignKeyViolation { table: &'static str, key: String },
    #[error("no row in {table} for key {key}")]
    NotFound { table: &'static str, key: String },
    #[error("contract violation: {0}")]
    ContractViolation(#[from] ContractViolation),
    #[error("journal failure: {0}")]
    Journal(String),
    #[error("store lock poisoned")]
    LockPoisoned,
}

/// Result of a compare-and-set on a certificate's status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusWrite {
    /// The certificate was pending and now carries the requested verdict.
    Applied(CertificateRecord),
    /// The certificate already had a verdict; the stored record is returned untouched.
    AlreadyTerminal(CertificateRecord),
}

impl StatusWrite {
    pub fn record(&self) -> &CertificateRecord {
        match self {
            Self::Applied(record) | Self::AlreadyTerminal(record) => record,
        }
    }

    pub fn into_record(self) -> CertificateRecord {
        match self {
            Self::Applied(record) | Self::AlreadyTerminal(record) => record,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableCounts {
    pub users: usize,
    pub certificates: usize,
    pub original_records: usize,
}

/// In-memory tables for the three ledgers, with the secondary indexes the
/// queries need: unique `users.email`, `certificates.owner_id`, unique
/// `original_records.fingerprint`.
#[derive(Debug, Clone, Default)]
pub struct LedgerTables {
    users: BTreeMap<UserId, UserRecord>,
    users_by_email: BTreeMap<EmailAddress, UserId>,

    certificates: BTreeMap<CertificateId, CertificateRecord>,
    certificates_by_owner: BTreeMap<UserId, BTreeSet<CertificateId>>,

    originals: BTreeMap<OriginalRecordId, OriginalRecord>,
    originals_by_fingerprint: BTreeMap<Fingerprint, OriginalRecordId>,
}

impl LedgerTables {
    pub fn new_in_memory() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> TableCounts {
        TableCounts {
            users: self.users.len(),
            certificates: self.certificates.len(),
            original_records: self.originals.len(),
        }
    }

    pub fn check_insert_user(&self, record: &UserRecord) -> Result<(), StorageError> {
        record.validate()?;
        if self.users.contains_key(&record.user_id) {
            return Err(StorageError::DuplicateKey {
                table: "users",
                key: record.user_id.as_str().to_string(),
            });
        }
        if self.users_by_email.contains_key(&record.email) {
            return Err(StorageError::DuplicateKey {
                table: "users.email",
                key: record.email.as_str().to_string(),
            });
        }
        Ok(())
    }

    pub fn insert_user(&mut self, record: UserRecord) -> Result<(), StorageError> {
        self.check_insert_user(&record)?;
        self.users_by_email
            .insert(record.email.clone(), record.user_id.clone());
        self.users.insert(record.user_id.clone(), record);
        Ok(())
    }

    pub fn user(&self, user_id: &UserId) -> Option<&UserRecord> {
        self.users.get(user_id)
    }

    pub fn user_by_email(&self, email: &EmailAddress) -> Option<&UserRecord> {
        self.users_by_email
            .get(email)
            .and_then(|user_id| self.users.get(user_id))
    }

    pub fn users_newest_first(&self) -> Vec<UserRecord> {
        let mut rows: Vec<UserRecord> = self.users.values().cloned().collect();
        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.user_id.cmp(&a.user_id))
        });
        rows
    }

    pub fn check_insert_certificate(&self, record: &CertificateRecord) -> Result<(), StorageError> {
        record.validate()?;
        if record.status != CertificateStatus::Pending {
            return Err(ContractViolation::InvalidValue {
                field: "certificate_record.status",
                reason: "new certificates must be pending",
            }
            .into());
        }
        if !self.users.contains_key(&record.owner_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "certificates.owner_id",
                key: record.owner_id.as_str().to_string(),
            });
        }
        if self.certificates.contains_key(&record.certificate_id) {
            return Err(StorageError::DuplicateKey {
                table: "certificates",
                key: record.certificate_id.as_str().to_string(),
            });
        }
        Ok(())
    }

    pub fn insert_certificate(&mut self, record: CertificateRecord) -> Result<(), StorageError> {
        self.check_insert_certificate(&record)?;
        self.certificates_by_owner
            .entry(record.owner_id.clone())
            .or_default()
            .insert(record.certificate_id.clone());
        self.certificates
            .insert(record.certificate_id.clone(), record);
        Ok(())
    }

    pub fn certificate(&self, certificate_id: &CertificateId) -> Option<&CertificateRecord> {
        self.certificates.get(certificate_id)
    }

    /// Rows visible in `scope`, newest upload first. Owner scopes read only the
    /// owner index, never the full table.
    pub fn certificates_in_scope(&self, scope: &ListScope) -> Vec<CertificateRecord> {
        let mut rows: Vec<CertificateRecord> = match scope {
            ListScope::All => self.certificates.values().cloned().collect(),
            ListScope::OwnedBy(owner_id) => self
                .certificates_by_owner
                .get(owner_id)
                .map(|ids| {
                    ids.iter()
                        .filter_map(|id| self.certificates.get(id))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default(),
        };
        rows.sort_by(|a, b| {
            b.uploaded_at
                .cmp(&a.uploaded_at)
                .then_with(|| b.certificate_id.cmp(&a.certificate_id))
        });
        rows
    }

    /// Computes the outcome of a status compare-and-set without mutating anything.
    pub fn plan_status_write(
        &self,
        certificate_id: &CertificateId,
        status: CertificateStatus,
        verified_at: UnixTimeMs,
        verified_by: &UserId,
    ) -> Result<StatusWrite, StorageError> {
        let Some(current) = self.certificates.get(certificate_id) else {
            return Err(StorageError::NotFound {
                table: "certificates",
                key: certificate_id.as_str().to_string(),
            });
        };
        if current.status.is_terminal() {
            return Ok(StatusWrite::AlreadyTerminal(current.clone()));
        }
        if !self.users.contains_key(verified_by) {
            return Err(StorageError::ForeignKeyViolation {
                table: "certificates.verified_by",
                key: verified_by.as_str().to_string(),
            });
        }
        let next = current.adjudicated(status, verified_at, verified_by.clone())?;
        Ok(StatusWrite::Applied(next))
    }

    pub fn compare_and_set_status(
        &mut self,
        certificate_id: &CertificateId,
        status: CertificateStatus,
        verified_at: UnixTimeMs,
        verified_by: &UserId,
    ) -> Result<StatusWrite, StorageError> {
        let write = self.plan_status_write(certificate_id, status, verified_at, verified_by)?;
        if let StatusWrite::Applied(record) = &write {
            self.certificates
                .insert(record.certificate_id.clone(), record.clone());
        }
        Ok(write)
    }

    pub fn check_insert_original(&self, record: &OriginalRecord) -> Result<(), StorageError> {
        record.validate()?;
        if self.originals.contains_key(&record.original_id) {
            return Err(StorageError::DuplicateKey {
                table: "original_records",
                key: record.original_id.as_str().to_string(),
            });
        }
        if self.originals_by_fingerprint.contains_key(&record.fingerprint) {
            return Err(StorageError::DuplicateKey {
                table: "original_records.fingerprint",
                key: record.fingerprint.as_str().to_string(),
            });
        }
        Ok(())
    }

    pub fn insert_original(&mut self, record: OriginalRecord) -> Result<(), StorageError> {
        self.check_insert_original(&record)?;
        self.originals_by_fingerprint
            .insert(record.fingerprint.clone(), record.original_id.clone());
        self.originals.insert(record.original_id.clone(), record);
        Ok(())
    }

    pub fn original_by_fingerprint(&self, fingerprint: &Fingerprint) -> Option<&OriginalRecord> {
        self.originals_by_fingerprint
            .get(fingerprint)
            .and_then(|id| self.originals.get(id))
    }
}
