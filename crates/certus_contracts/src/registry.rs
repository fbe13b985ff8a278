#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::certificate::{FileRef, Fingerprint, TITLE_MAX_LEN};
use crate::common::{validate_id, validate_text};
use crate::{ContractViolation, SchemaVersion, UnixTimeMs, Validate};

pub const REGISTRY_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OriginalRecordId(String);

impl OriginalRecordId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for OriginalRecordId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("original_record_id", &self.0, 64)
    }
}

/// Ground-truth reference entry issued by a trusted authority. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalRecord {
    pub schema_version: SchemaVersion,
    pub original_id: OriginalRecordId,
    pub fingerprint: Fingerprint,
    pub title: String,
    pub file_ref: FileRef,
    pub registered_at: UnixTimeMs,
}

impl OriginalRecord {
    pub fn v1(
        original_id: OriginalRecordId,
        fingerprint: Fingerprint,
        title: String,
        file_ref: FileRef,
        registered_at: UnixTimeMs,
    ) -> Result<Self, ContractViolation> {
        let record = Self {
            schema_version: REGISTRY_CONTRACT_VERSION,
            original_id,
            fingerprint,
            title: title.trim().to_string(),
            file_ref,
            registered_at,
        };
        record.validate()?;
        Ok(record)
    }
}

impl Validate for OriginalRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != REGISTRY_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "original_record.schema_version",
                reason: "unsupported schema version",
            });
        }
        self.original_id.validate()?;
        self.fingerprint.validate()?;
        validate_text("original_record.title", &self.title, TITLE_MAX_LEN)?;
        self.file_ref.validate()?;
        Ok(())
    }
}
