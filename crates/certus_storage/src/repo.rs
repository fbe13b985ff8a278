#![forbid(unsafe_code)]

use certus_contracts::certificate::{
    CertificateId, CertificateRecord, CertificateStatus, Fingerprint, ListScope,
};
use certus_contracts::identity::{EmailAddress, UserId, UserRecord};
use certus_contracts::registry::OriginalRecord;
use certus_contracts::UnixTimeMs;

use crate::tables::{StatusWrite, StorageError, TableCounts};

/// Typed repository interface for the user ledger.
pub trait IdentityRepo: Send + Sync {
    fn insert_user_row(&self, record: UserRecord) -> Result<(), StorageError>;
    fn user_row(&self, user_id: &UserId) -> Result<Option<UserRecord>, StorageError>;
    fn user_row_by_email(&self, email: &EmailAddress) -> Result<Option<UserRecord>, StorageError>;
    fn user_rows_newest_first(&self) -> Result<Vec<UserRecord>, StorageError>;
}

/// Typed repository interface for the certificate ledger.
pub trait CertificateRepo: Send + Sync {
    fn insert_certificate_row(&self, record: CertificateRecord) -> Result<(), StorageError>;
    fn certificate_row(
        &self,
        certificate_id: &CertificateId,
    ) -> Result<Option<CertificateRecord>, StorageError>;
    fn certificate_rows_in_scope(
        &self,
        scope: &ListScope,
    ) -> Result<Vec<CertificateRecord>, StorageError>;

    /// Atomically moves a pending row to `status`. A row that is already
    /// terminal is returned as `StatusWrite::AlreadyTerminal` and left as is.
    fn compare_and_set_status_row(
        &self,
        certificate_id: &CertificateId,
        status: CertificateStatus,
        verified_at: UnixTimeMs,
        verified_by: &UserId,
    ) -> Result<StatusWrite, StorageError>;
}

/// Typed repository interface for the original-record registry. Append-only.
pub trait OriginalRecordRepo: Send + Sync {
    fn insert_original_row(&self, record: OriginalRecord) -> Result<(), StorageError>;
    fn original_row_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<OriginalRecord>, StorageError>;
}

pub trait LedgerHealthRepo: Send + Sync {
    fn table_counts(&self) -> Result<TableCounts, StorageError>;
}
