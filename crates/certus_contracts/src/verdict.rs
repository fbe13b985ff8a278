#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::certificate::{CertificateRecord, CertificateStatus};
use crate::registry::OriginalRecordId;

/// Why a certificate ended up in its returned state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerdictReason {
    MatchedOriginal {
        original_id: OriginalRecordId,
        original_title: String,
    },
    NoRegistryMatch,
    RejectedByAdjudicator,
    AlreadyAdjudicated { status: CertificateStatus },
}

impl VerdictReason {
    pub fn summary(&self) -> String {
        match self {
            Self::MatchedOriginal { original_title, .. } => format!(
                "certificate matches original record '{original_title}' and is verified"
            ),
            Self::NoRegistryMatch => {
                "no original record matches the certificate content; rejected as non-original"
                    .to_string()
            }
            Self::RejectedByAdjudicator => "certificate rejected by adjudicator".to_string(),
            Self::AlreadyAdjudicated { status } => format!(
                "certificate was already {}; verdict unchanged",
                status.as_str()
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictOutcome {
    pub certificate: CertificateRecord,
    pub reason: VerdictReason,
    /// False when the call observed an existing verdict instead of writing one.
    pub applied: bool,
}
