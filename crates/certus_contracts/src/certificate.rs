#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::common::{validate_id, validate_optional_text, validate_text};
use crate::identity::{EmailAddress, UserId};
use crate::{ContractViolation, SchemaVersion, UnixTimeMs, Validate};

pub const CERTIFICATE_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

pub const TITLE_MAX_LEN: usize = 256;
pub const DESCRIPTION_MAX_LEN: usize = 2048;
pub const FILE_NAME_MAX_LEN: usize = 255;
pub const FILE_REF_MAX_LEN: usize = 512;
pub const FINGERPRINT_MAX_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CertificateId(String);

impl CertificateId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for CertificateId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("certificate_id", &self.0, 64)
    }
}

/// Content-derived identifier of a file. Never a file name or a title.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn parse(raw: &str) -> Result<Self, ContractViolation> {
        let v = Self(raw.trim().to_ascii_lowercase());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for Fingerprint {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "fingerprint",
                reason: "must not be empty",
            });
        }
        if self.0.len() > FINGERPRINT_MAX_LEN {
            return Err(ContractViolation::InvalidLength {
                field: "fingerprint",
                max: FINGERPRINT_MAX_LEN,
                got: self.0.len(),
            });
        }
        if !self
            .0
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
        {
            return Err(ContractViolation::InvalidValue {
                field: "fingerprint",
                reason: "must contain only lowercase ascii alphanumerics",
            });
        }
        Ok(())
    }
}

/// Stable reference to stored file bytes, as returned by a storage gateway.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileRef(String);

impl FileRef {
    pub fn new(raw: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(raw.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for FileRef {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_text("file_ref", &self.0, FILE_REF_MAX_LEN)?;
        if self.0.chars().any(char::is_whitespace) {
            return Err(ContractViolation::InvalidValue {
                field: "file_ref",
                reason: "must not contain whitespace",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateStatus {
    Pending,
    Verified,
    Rejected,
}

impl CertificateStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Status an adjudicator may ask for. `Verify` means "attempt verification".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestedVerdict {
    Verify,
    Reject,
}

impl RequestedVerdict {
    pub fn parse(raw: &str) -> Result<Self, ContractViolation> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "verified" => Ok(Self::Verify),
            "rejected" => Ok(Self::Reject),
            _ => Err(ContractViolation::InvalidValue {
                field: "status",
                reason: "must be one of: verified, rejected",
            }),
        }
    }
}

/// How a caller names the owner of a new certificate. Resolved to a `UserId`
/// once, at the ledger boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OwnerRef {
    ByUserId(UserId),
    ByEmail(EmailAddress),
}

/// Query scope for certificate listings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListScope {
    All,
    OwnedBy(UserId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFileMeta {
    pub file_name: String,
    pub content_type: Option<String>,
    pub size_bytes: u64,
}

impl Validate for StoredFileMeta {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_text("stored_file_meta.file_name", &self.file_name, FILE_NAME_MAX_LEN)?;
        if let Some(content_type) = &self.content_type {
            validate_text("stored_file_meta.content_type", content_type, 128)?;
        }
        if self.size_bytes == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "stored_file_meta.size_bytes",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub schema_version: SchemaVersion,
    pub certificate_id: CertificateId,
    pub owner_id: UserId,
    pub title: String,
    pub description: String,
    pub file_ref: FileRef,
    pub file: StoredFileMeta,
    pub fingerprint: Fingerprint,
    pub status: CertificateStatus,
    pub uploaded_at: UnixTimeMs,
    pub verified_at: Option<UnixTimeMs>,
    pub verified_by: Option<UserId>,
}

impl CertificateRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn pending_v1(
        certificate_id: CertificateId,
        owner_id: UserId,
        title: String,
        description: String,
        file_ref: FileRef,
        file: StoredFileMeta,
        fingerprint: Fingerprint,
        uploaded_at: UnixTimeMs,
    ) -> Result<Self, ContractViolation> {
        let record = Self {
            schema_version: CERTIFICATE_CONTRACT_VERSION,
            certificate_id,
            owner_id,
            title: title.trim().to_string(),
            description: description.trim().to_string(),
            file_ref,
            file,
            fingerprint,
            status: CertificateStatus::Pending,
            uploaded_at,
            verified_at: None,
            verified_by: None,
        };
        record.validate()?;
        Ok(record)
    }

    /// Terminal copy of a pending record. Refuses to overwrite an existing verdict.
    pub fn adjudicated(
        &self,
        status: CertificateStatus,
        verified_at: UnixTimeMs,
        verified_by: UserId,
    ) -> Result<Self, ContractViolation> {
        if self.status.is_terminal() {
            return Err(ContractViolation::InvalidValue {
                field: "certificate_record.status",
                reason: "is already terminal",
            });
        }
        if !status.is_terminal() {
            return Err(ContractViolation::InvalidValue {
                field: "certificate_record.status",
                reason: "adjudication target must be verified or rejected",
            });
        }
        let mut next = self.clone();
        next.status = status;
        next.verified_at = Some(verified_at);
        next.verified_by = Some(verified_by);
        next.validate()?;
        Ok(next)
    }
}

impl Validate for CertificateRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != CERTIFICATE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "certificate_record.schema_version",
                reason: "unsupported schema version",
            });
        }
        self.certificate_id.validate()?;
        self.owner_id.validate()?;
        validate_text("certificate_record.title", &self.title, TITLE_MAX_LEN)?;
        validate_optional_text(
            "certificate_record.description",
            &self.description,
            DESCRIPTION_MAX_LEN,
        )?;
        self.file_ref.validate()?;
        self.file.validate()?;
        self.fingerprint.validate()?;
        let terminal = self.status.is_terminal();
        if terminal != self.verified_by.is_some() {
            return Err(ContractViolation::InvalidValue {
                field: "certificate_record.verified_by",
                reason: "must be present exactly when status is terminal",
            });
        }
        if terminal != self.verified_at.is_some() {
            return Err(ContractViolation::InvalidValue {
                field: "certificate_record.verified_at",
                reason: "must be present exactly when status is terminal",
            });
        }
        if let Some(verified_by) = &self.verified_by {
            verified_by.validate()?;
        }
        if let Some(verified_at) = self.verified_at {
            if verified_at < self.uploaded_at {
                return Err(ContractViolation::InvalidValue {
                    field: "certificate_record.verified_at",
                    reason: "must not precede uploaded_at",
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> CertificateRecord {
        CertificateRecord::pending_v1(
            CertificateId::new("cert_01").unwrap(),
            UserId::new("usr_01").unwrap(),
            "BSc Diploma".to_string(),
            String::new(),
            FileRef::new("local:cert_01.pdf").unwrap(),
            StoredFileMeta {
                file_name: "diploma.pdf".to_string(),
                content_type: Some("application/pdf".to_string()),
                size_bytes: 42,
            },
            Fingerprint::parse("abc123").unwrap(),
            UnixTimeMs(100),
        )
        .unwrap()
    }

    #[test]
    fn at_certificate_01_new_records_are_pending_without_adjudicator() {
        let record = pending();
        assert_eq!(record.status, CertificateStatus::Pending);
        assert!(record.verified_by.is_none());
        assert!(record.verified_at.is_none());
    }

    #[test]
    fn at_certificate_02_adjudication_sets_verifier_and_time() {
        let admin = UserId::new("usr_admin").unwrap();
        let verified = pending()
            .adjudicated(CertificateStatus::Verified, UnixTimeMs(200), admin.clone())
            .unwrap();
        assert_eq!(verified.status, CertificateStatus::Verified);
        assert_eq!(verified.verified_by, Some(admin));
        assert_eq!(verified.verified_at, Some(UnixTimeMs(200)));
    }

    #[test]
    fn at_certificate_03_terminal_records_cannot_be_readjudicated() {
        let admin = UserId::new("usr_admin").unwrap();
        let rejected = pending()
            .adjudicated(CertificateStatus::Rejected, UnixTimeMs(200), admin.clone())
            .unwrap();
        assert!(rejected
            .adjudicated(CertificateStatus::Verified, UnixTimeMs(300), admin.clone())
            .is_err());
        assert!(pending()
            .adjudicated(CertificateStatus::Pending, UnixTimeMs(300), admin)
            .is_err());
    }

    #[test]
    fn at_certificate_04_verifier_presence_tracks_terminal_status() {
        let mut record = pending();
        record.verified_by = Some(UserId::new("usr_admin").unwrap());
        assert!(record.validate().is_err());

        let mut record = pending();
        record.status = CertificateStatus::Verified;
        assert!(record.validate().is_err());
    }

    #[test]
    fn at_certificate_05_requested_verdict_accepts_only_terminal_names() {
        assert_eq!(
            RequestedVerdict::parse("Verified").unwrap(),
            RequestedVerdict::Verify
        );
        assert_eq!(
            RequestedVerdict::parse("rejected").unwrap(),
            RequestedVerdict::Reject
        );
        assert!(RequestedVerdict::parse("pending").is_err());
        assert!(RequestedVerdict::parse("").is_err());
    }

    #[test]
    fn at_certificate_06_fingerprint_is_lowercased_and_restricted() {
        assert_eq!(Fingerprint::parse(" ABC123 ").unwrap().as_str(), "abc123");
        assert!(Fingerprint::parse("abc-123").is_err());
        assert!(Fingerprint::parse("").is_err());
    }

    #[test]
    fn at_certificate_07_status_serializes_lowercase() {
        let json = serde_json::to_string(&CertificateStatus::Rejected).unwrap();
        assert_eq!(json, "\"rejected\"");
    }
}
