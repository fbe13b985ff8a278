#![forbid(unsafe_code)]

use std::sync::Arc;

use certus_contracts::certificate::{
    CertificateRecord, OwnerRef, StoredFileMeta, DESCRIPTION_MAX_LEN, TITLE_MAX_LEN,
};
use certus_contracts::identity::Claims;
use certus_engines::file_rules::UploadRules;
use certus_storage::gateway::{discard, store_and_fingerprint};
use certus_storage::StorageGateway;
use tracing::{info, warn};

use crate::certificates::{CertificateLedger, NewCertificate};
use crate::error::CoreError;
use crate::ids::new_certificate_id;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub title: String,
    pub description: Option<String>,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

pub struct UploadService {
    certificates: Arc<CertificateLedger>,
    gateway: Arc<dyn StorageGateway>,
    rules: UploadRules,
}

impl UploadService {
    pub fn new(
        certificates: Arc<CertificateLedger>,
        gateway: Arc<dyn StorageGateway>,
        rules: UploadRules,
    ) -> Self {
        Self {
            certificates,
            gateway,
            rules,
        }
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.rules.max_upload_bytes()
    }

    /// Stores the bytes, fingerprints what was persisted, then records a
    /// pending certificate owned by the caller. If the ledger write fails the
    /// stored bytes are removed.
    pub fn upload(&self, claims: &Claims, request: UploadRequest) -> Result<CertificateRecord, CoreError> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(CoreError::validation("title is required"));
        }
        if title.chars().count() > TITLE_MAX_LEN {
            return Err(CoreError::validation(format!(
                "title must be at most {TITLE_MAX_LEN} characters"
            )));
        }
        let description = request.description.unwrap_or_default();
        if description.trim().chars().count() > DESCRIPTION_MAX_LEN {
            return Err(CoreError::validation(format!(
                "description must be at most {DESCRIPTION_MAX_LEN} characters"
            )));
        }
        let accepted = self
            .rules
            .check(&request.file_name, request.bytes.len() as u64)?;

        let certificate_id = new_certificate_id()?;
        let key = format!("{}.{}", certificate_id.as_str(), accepted.extension);
        let blob = store_and_fingerprint(self.gateway.as_ref(), &key, &request.bytes)?;

        let content_type = request
            .content_type
            .map(|ct| ct.trim().to_string())
            .filter(|ct| !ct.is_empty())
            .unwrap_or_else(|| accepted.implied_content_type().to_string());
        let new = NewCertificate {
            title: title.to_string(),
            description,
            file_ref: blob.file_ref.clone(),
            fingerprint: blob.fingerprint,
            file: StoredFileMeta {
                file_name: accepted.file_name,
                content_type: Some(content_type),
                size_bytes: blob.size_bytes,
            },
        };
        match self.certificates.submit(
            &OwnerRef::ByUserId(claims.user_id.clone()),
            certificate_id,
            new,
        ) {
            Ok(record) => {
                info!(
                    certificate_id = record.certificate_id.as_str(),
                    owner_id = record.owner_id.as_str(),
                    size_bytes = record.file.size_bytes,
                    "certificate uploaded"
                );
                Ok(record)
            }
            Err(err) => {
                warn!(
                    file_ref = blob.file_ref.as_str(),
                    error = %err,
                    "ledger write failed; removing stored upload"
                );
                discard(self.gateway.as_ref(), &blob.file_ref);
                Err(err)
            }
        }
    }
}
