#![forbid(unsafe_code)]

use std::sync::Arc;

use certus_contracts::certificate::{FileRef, Fingerprint};
use certus_contracts::identity::Claims;
use certus_contracts::registry::OriginalRecord;
use certus_engines::access;
use certus_storage::repo::OriginalRecordRepo;
use serde::Deserialize;
use tracing::info;

use crate::clock::Clock;
use crate::error::CoreError;
use crate::ids::new_original_record_id;

/// One entry of a registry seed file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedEntry {
    pub fingerprint: String,
    pub title: String,
    pub file_ref: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeedReport {
    pub inserted: usize,
    pub already_present: usize,
}

pub struct AssetRegistry {
    originals: Arc<dyn OriginalRecordRepo>,
    clock: Arc<dyn Clock>,
}

impl AssetRegistry {
    pub fn new(originals: Arc<dyn OriginalRecordRepo>, clock: Arc<dyn Clock>) -> Self {
        Self { originals, clock }
    }

    pub fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<OriginalRecord>, CoreError> {
        Ok(self.originals.original_row_by_fingerprint(fingerprint)?)
    }

    pub fn register_original(
        &self,
        claims: &Claims,
        fingerprint: &str,
        title: &str,
        file_ref: &str,
    ) -> Result<OriginalRecord, CoreError> {
        access::require_admin(claims)?;
        let record = self.seed(fingerprint, title, file_ref)?;
        info!(
            original_id = record.original_id.as_str(),
            registered_by = claims.user_id.as_str(),
            "original record registered"
        );
        Ok(record)
    }

    /// Inserts without an access check. Startup import only.
    pub fn seed(&self, fingerprint: &str, title: &str, file_ref: &str) -> Result<OriginalRecord, CoreError> {
        let record = OriginalRecord::v1(
            new_original_record_id()?,
            Fingerprint::parse(fingerprint)?,
            title.to_string(),
            FileRef::new(file_ref.trim())?,
            self.clock.now(),
        )?;
        self.originals.insert_original_row(record.clone())?;
        Ok(record)
    }

    /// Imports entries whose fingerprint is not registered yet. Restarting with
    /// the same seed file over a durable store inserts nothing new.
    pub fn seed_all(&self, entries: &[SeedEntry]) -> Result<SeedReport, CoreError> {
        let mut report = SeedReport::default();
        for entry in entries {
            let fingerprint = Fingerprint::parse(&entry.fingerprint)?;
            if self.find_by_fingerprint(&fingerprint)?.is_some() {
                report.already_present += 1;
                continue;
            }
            self.seed(&entry.fingerprint, &entry.title, &entry.file_ref)?;
            report.inserted += 1;
        }
        info!(
            inserted = report.inserted,
            already_present = report.already_present,
            "registry seed imported"
        );
        Ok(report)
    }
}

pub fn parse_seed_file(json: &str) -> Result<Vec<SeedEntry>, CoreError> {
    serde_json::from_str(json)
        .map_err(|err| CoreError::validation(format!("invalid registry seed file: {err}")))
}
