#![forbid(unsafe_code)]

use std::sync::Arc;

use certus_contracts::certificate::{
    CertificateId, CertificateRecord, CertificateStatus, RequestedVerdict,
};
use certus_contracts::identity::Claims;
use certus_contracts::verdict::{VerdictOutcome, VerdictReason};
use certus_engines::access;
use certus_engines::verdict::{plan_verdict, resolve_registry_match, VerdictPlan};
use certus_storage::StatusWrite;
use tracing::info;

use crate::certificates::CertificateLedger;
use crate::error::CoreError;
use crate::registry::AssetRegistry;

/// The single adjudication path for certificates.
pub struct VerificationEngine {
    certificates: Arc<CertificateLedger>,
    registry: Arc<AssetRegistry>,
}

impl VerificationEngine {
    pub fn new(certificates: Arc<CertificateLedger>, registry: Arc<AssetRegistry>) -> Self {
        Self {
            certificates,
            registry,
        }
    }

    pub fn adjudicate(
        &self,
        claims: &Claims,
        certificate_id: &CertificateId,
        requested: RequestedVerdict,
    ) -> Result<VerdictOutcome, CoreError> {
        access::require_admin(claims)?;
        let current = self.certificates.get(certificate_id)?;
        match plan_verdict(&current, requested) {
            VerdictPlan::KeepStored(reason) => Ok(VerdictOutcome {
                certificate: current,
                reason,
                applied: false,
            }),
            VerdictPlan::Write { status, reason } => self.write(claims, &current, status, reason),
            VerdictPlan::ConsultRegistry => {
                let found = self.registry.find_by_fingerprint(&current.fingerprint)?;
                let (status, reason) = resolve_registry_match(found.as_ref());
                self.write(claims, &current, status, reason)
            }
        }
    }

    fn write(
        &self,
        claims: &Claims,
        current: &CertificateRecord,
        status: CertificateStatus,
        reason: VerdictReason,
    ) -> Result<VerdictOutcome, CoreError> {
        match self
            .certificates
            .transition(&current.certificate_id, status, &claims.user_id)?
        {
            StatusWrite::Applied(certificate) => {
                info!(
                    certificate_id = certificate.certificate_id.as_str(),
                    status = certificate.status.as_str(),
                    verified_by = claims.user_id.as_str(),
                    "verdict applied"
                );
                Ok(VerdictOutcome {
                    certificate,
                    reason,
                    applied: true,
                })
            }
            // Another adjudicator won the race; report their verdict.
            StatusWrite::AlreadyTerminal(certificate) => Ok(VerdictOutcome {
                reason: VerdictReason::AlreadyAdjudicated {
                    status: certificate.status,
                },
                certificate,
                applied: false,
            }),
        }
    }
}
