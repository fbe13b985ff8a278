#![forbid(unsafe_code)]

use certus_contracts::certificate::CertificateId;
use certus_contracts::identity::UserId;
use certus_contracts::registry::OriginalRecordId;
use certus_contracts::ContractViolation;
use uuid::Uuid;

fn prefixed(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

pub fn new_user_id() -> Result<UserId, ContractViolation> {
    UserId::new(prefixed("usr"))
}

pub fn new_certificate_id() -> Result<CertificateId, ContractViolation> {
    CertificateId::new(prefixed("cert"))
}

pub fn new_original_record_id() -> Result<OriginalRecordId, ContractViolation> {
    OriginalRecordId::new(prefixed("orig"))
}
