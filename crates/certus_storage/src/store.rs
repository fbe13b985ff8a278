#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use certus_contracts::certificate::{
    CertificateId, CertificateRecord, CertificateStatus, Fingerprint, ListScope,
};
use certus_contracts::identity::{EmailAddress, UserId, UserRecord};
use certus_contracts::registry::OriginalRecord;
use certus_contracts::UnixTimeMs;
use tracing::{debug, info};

use crate::journal::{JournalEntry, LedgerJournal};
use crate::repo::{CertificateRepo, IdentityRepo, LedgerHealthRepo, OriginalRecordRepo};
use crate::tables::{LedgerTables, StatusWrite, StorageError, TableCounts};

/// Shared ledger store. Every mutation runs under one lock: validate against
/// the tables, append to the journal, then apply. A failed append leaves the
/// tables untouched.
#[derive(Debug)]
pub struct LedgerStore {
    tables: Mutex<LedgerTables>,
    journal: Option<LedgerJournal>,
}

impl LedgerStore {
    pub fn new_in_memory() -> Self {
        Self {
            tables: Mutex::new(LedgerTables::new_in_memory()),
            journal: None,
        }
    }

    /// Opens (or creates) a journal-backed store and replays every prior entry.
    pub fn open_with_journal(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let journal = LedgerJournal::open(path)?;
        let mut tables = LedgerTables::new_in_memory();
        let entries = journal.read_entries()?;
        let replayed = entries.len();
        for (idx, entry) in entries.into_iter().enumerate() {
            entry.apply(&mut tables).map_err(|err| {
                StorageError::Journal(format!("journal replay failed at entry {}: {}", idx + 1, err))
            })?;
        }
        info!(
            path = %journal.path().display(),
            entries = replayed,
            "ledger journal replayed"
        );
        Ok(Self {
            tables: Mutex::new(tables),
            journal: Some(journal),
        })
    }

    pub fn is_durable(&self) -> bool {
        self.journal.is_some()
    }

    fn lock(&self) -> Result<MutexGuard<'_, LedgerTables>, StorageError> {
        self.tables.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn append(&self, entry: &JournalEntry) -> Result<(), StorageError> {
        match &self.journal {
            Some(journal) => journal.append(entry),
            None => Ok(()),
        }
    }
}

impl IdentityRepo for LedgerStore {
    fn insert_user_row(&self, record: UserRecord) -> Result<(), StorageError> {
        let mut tables = self.lock()?;
        tables.check_insert_user(&record)?;
        self.append(&JournalEntry::UserInserted {
            record: record.clone(),
        })?;
        debug!(user_id = record.user_id.as_str(), "user row inserted");
        tables.insert_user(record)
    }

    fn user_row(&self, user_id: &UserId) -> Result<Option<UserRecord>, StorageError> {
        Ok(self.lock()?.user(user_id).cloned())
    }

    fn user_row_by_email(&self, email: &EmailAddress) -> Result<Option<UserRecord>, StorageError> {
        Ok(self.lock()?.user_by_email(email).cloned())
    }

    fn user_rows_newest_first(&self) -> Result<Vec<UserRecord>, StorageError> {
        Ok(self.lock()?.users_newest_first())
    }
}

impl CertificateRepo for LedgerStore {
    fn insert_certificate_row(&self, record: CertificateRecord) -> Result<(), StorageError> {
        let mut tables = self.lock()?;
        tables.check_insert_certificate(&record)?;
        self.append(&JournalEntry::CertificateInserted {
            record: record.clone(),
        })?;
        debug!(
            certificate_id = record.certificate_id.as_str(),
            owner_id = record.owner_id.as_str(),
            "certificate row inserted"
        );
        tables.insert_certificate(record)
    }

    fn certificate_row(
        &self,
        certificate_id: &CertificateId,
    ) -> Result<Option<CertificateRecord>, StorageError> {
        Ok(self.lock()?.certificate(certificate_id).cloned())
    }

    fn certificate_rows_in_scope(
        &self,
        scope: &ListScope,
    ) -> Result<Vec<CertificateRecord>, StorageError> {
        Ok(self.lock()?.certificates_in_scope(scope))
    }

    fn compare_and_set_status_row(
        &self,
        certificate_id: &CertificateId,
        status: CertificateStatus,
        verified_at: UnixTimeMs,
        verified_by: &UserId,
    ) -> Result<StatusWrite, StorageError> {
        let mut tables = self.lock()?;
        let planned = tables.plan_status_write(certificate_id, status, verified_at, verified_by)?;
        if !planned.was_applied() {
            return Ok(planned);
        }
        self.append(&JournalEntry::CertificateAdjudicated {
            certificate_id: certificate_id.clone(),
            status,
            verified_at,
            verified_by: verified_by.clone(),
        })?;
        debug!(
            certificate_id = certificate_id.as_str(),
            status = status.as_str(),
            "certificate status written"
        );
        tables.compare_and_set_status(certificate_id, status, verified_at, verified_by)
    }
}

impl OriginalRecordRepo for LedgerStore {
    fn insert_original_row(&self, record: OriginalRecord) -> Result<(), StorageError> {
        let mut tables = self.lock()?;
        tables.check_insert_original(&record)?;
        self.append(&JournalEntry::OriginalInserted {
            record: record.clone(),
        })?;
        debug!(
            original_id = record.original_id.as_str(),
            fingerprint = record.fingerprint.as_str(),
            "original record inserted"
        );
        tables.insert_original(record)
    }

    fn original_row_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<OriginalRecord>, StorageError> {
        Ok(self.lock()?.original_by_fingerprint(fingerprint).cloned())
    }
}

impl LedgerHealthRepo for LedgerStore {
    fn table_counts(&self) -> Result<TableCounts, StorageError> {
        Ok(self.lock()?.counts())
    }
}
