#![forbid(unsafe_code)]

//! Pure access policy. No lookups, no side effects.

use certus_contracts::certificate::{CertificateRecord, ListScope};
use certus_contracts::identity::Claims;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("access denied: {reason}")]
pub struct AccessDenied {
    pub reason: &'static str,
}

pub fn can_read(claims: &Claims, certificate: &CertificateRecord) -> bool {
    claims.is_admin() || certificate.owner_id == claims.user_id
}

/// Scope a listing query must be constrained to for this caller.
pub fn can_list(claims: &Claims) -> ListScope {
    if claims.is_admin() {
        ListScope::All
    } else {
        ListScope::OwnedBy(claims.user_id.clone())
    }
}

pub fn require_admin(claims: &Claims) -> Result<(), AccessDenied> {
    if claims.is_admin() {
        Ok(())
    } else {
        Err(AccessDenied {
            reason: "admin role required",
        })
    }
}

pub fn require_read(claims: &Claims, certificate: &CertificateRecord) -> Result<(), AccessDenied> {
    if can_read(claims, certificate) {
        Ok(())
    } else {
        Err(AccessDenied {
            reason: "only the owner or an admin may read this certificate",
        })
    }
}
