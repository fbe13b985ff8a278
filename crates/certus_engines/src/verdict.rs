#![forbid(unsafe_code)]

use certus_contracts::certificate::{CertificateRecord, CertificateStatus, RequestedVerdict};
use certus_contracts::registry::OriginalRecord;
use certus_contracts::verdict::VerdictReason;

/// First step of adjudication, decided from the stored record alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerdictPlan {
    /// The record already has a verdict; return it untouched.
    KeepStored(VerdictReason),
    /// Write `status` without consulting the registry.
    Write {
        status: CertificateStatus,
        reason: VerdictReason,
    },
    /// Look the fingerprint up in the registry, then call [`resolve_registry_match`].
    ConsultRegistry,
}

pub fn plan_verdict(current: &CertificateRecord, requested: RequestedVerdict) -> VerdictPlan {
    if current.status.is_terminal() {
        return VerdictPlan::KeepStored(VerdictReason::AlreadyAdjudicated {
            status: current.status,
        });
    }
    match requested {
        RequestedVerdict::Reject => VerdictPlan::Write {
            status: CertificateStatus::Rejected,
            reason: VerdictReason::RejectedByAdjudicator,
        },
        RequestedVerdict::Verify => VerdictPlan::ConsultRegistry,
    }
}

/// A registry hit verifies; a miss rejects as non-original. Neither is an error.
pub fn resolve_registry_match(found: Option<&OriginalRecord>) -> (CertificateStatus, VerdictReason) {
    match found {
        Some(original) => (
            CertificateStatus::Verified,
            VerdictReason::MatchedOriginal {
                original_id: original.original_id.clone(),
                original_title: original.title.clone(),
            },
        ),
        None => (CertificateStatus::Rejected, VerdictReason::NoRegistryMatch),
    }
}
