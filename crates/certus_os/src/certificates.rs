#![forbid(unsafe_code)]

use std::sync::Arc;

use certus_contracts::certificate::{
    CertificateId, CertificateRecord, CertificateStatus, FileRef, Fingerprint, ListScope,
    OwnerRef, StoredFileMeta,
};
use certus_contracts::identity::{Claims, UserId, UserSummary};
use certus_engines::access;
use certus_storage::repo::{CertificateRepo, IdentityRepo};
use certus_storage::StatusWrite;

use crate::clock::Clock;
use crate::error::CoreError;

/// Everything a new certificate row needs besides its id and owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCertificate {
    pub title: String,
    pub description: String,
    pub file_ref: FileRef,
    pub fingerprint: Fingerprint,
    pub file: StoredFileMeta,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateWithOwner {
    pub certificate: CertificateRecord,
    /// `None` when the owner row cannot be found.
    pub owner: Option<UserSummary>,
}

pub struct CertificateLedger {
    certificates: Arc<dyn CertificateRepo>,
    users: Arc<dyn IdentityRepo>,
    clock: Arc<dyn Clock>,
}

impl CertificateLedger {
    pub fn new(
        certificates: Arc<dyn CertificateRepo>,
        users: Arc<dyn IdentityRepo>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            certificates,
            users,
            clock,
        }
    }

    fn resolve_owner(&self, owner: &OwnerRef) -> Result<UserId, CoreError> {
        let found = match owner {
            OwnerRef::ByUserId(user_id) => self.users.user_row(user_id)?,
            OwnerRef::ByEmail(email) => self.users.user_row_by_email(email)?,
        };
        found.map(|u| u.user_id).ok_or_else(|| CoreError::NotFound {
            entity: "user",
            id: match owner {
                OwnerRef::ByUserId(user_id) => user_id.as_str().to_string(),
                OwnerRef::ByEmail(email) => email.as_str().to_string(),
            },
        })
    }

    /// Records a new `pending` certificate for the resolved owner.
    pub fn submit(
        &self,
        owner: &OwnerRef,
        certificate_id: CertificateId,
        new: NewCertificate,
    ) -> Result<CertificateRecord, CoreError> {
        let owner_id = self.resolve_owner(owner)?;
        let record = CertificateRecord::pending_v1(
            certificate_id,
            owner_id,
            new.title,
            new.description,
            new.file_ref,
            new.file,
            new.fingerprint,
            self.clock.now(),
        )?;
        self.certificates.insert_certificate_row(record.clone())?;
        Ok(record)
    }

    pub fn get(&self, certificate_id: &CertificateId) -> Result<CertificateRecord, CoreError> {
        self.certificates
            .certificate_row(certificate_id)?
            .ok_or_else(|| CoreError::NotFound {
                entity: "certificate",
                id: certificate_id.as_str().to_string(),
            })
    }

    pub fn list_by_scope(&self, scope: &ListScope) -> Result<Vec<CertificateRecord>, CoreError> {
        Ok(self.certificates.certificate_rows_in_scope(scope)?)
    }

    pub fn list_with_owners(&self, scope: &ListScope) -> Result<Vec<CertificateWithOwner>, CoreError> {
        self.list_by_scope(scope)?
            .into_iter()
            .map(|certificate| {
                let owner = self
                    .users
                    .user_row(&certificate.owner_id)?
                    .map(|u| u.summary());
                Ok(CertificateWithOwner { certificate, owner })
            })
            .collect()
    }

    /// Compare-and-set from `pending`. A terminal row comes back unchanged.
    pub fn transition(
        &self,
        certificate_id: &CertificateId,
        status: CertificateStatus,
        adjudicator: &UserId,
    ) -> Result<StatusWrite, CoreError> {
        let uploaded_at = self.get(certificate_id)?.uploaded_at;
        let verified_at = self.clock.now().max(uploaded_at);
        Ok(self.certificates.compare_and_set_status_row(
            certificate_id,
            status,
            verified_at,
            adjudicator,
        )?)
    }

    /// Direct read for a caller: owner or admin only.
    pub fn read_for(
        &self,
        claims: &Claims,
        certificate_id: &CertificateId,
    ) -> Result<CertificateRecord, CoreError> {
        let record = self.get(certificate_id)?;
        access::require_read(claims, &record)?;
        Ok(record)
    }

    pub fn list_for(&self, claims: &Claims) -> Result<Vec<CertificateRecord>, CoreError> {
        self.list_by_scope(&access::can_list(claims))
    }

    pub fn list_all_with_owners(&self, claims: &Claims) -> Result<Vec<CertificateWithOwner>, CoreError> {
        access::require_admin(claims)?;
        self.list_with_owners(&ListScope::All)
    }
}
