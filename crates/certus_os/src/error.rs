#![forbid(unsafe_code)]

use certus_contracts::ContractViolation;
use certus_engines::access::AccessDenied;
use certus_engines::file_rules::FileRuleViolation;
use certus_engines::token::TokenError;
use certus_storage::{GatewayError, StorageError};

/// Error classes visible to callers. Every `CoreError` belongs to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Unauthenticated,
    Unauthorized,
    NotFound,
    Conflict,
    Storage,
    Persistence,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::Unauthenticated => "unauthenticated",
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Storage => "storage_error",
            Self::Persistence => "persistence_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("authentication token is missing")]
    MissingToken,
    #[error("authentication token has expired")]
    TokenExpired,
    #[error("authentication token is invalid")]
    TokenMalformed,
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
    #[error("an account with this email already exists")]
    DuplicateEmail,
    #[error("an original record with this fingerprint already exists")]
    DuplicateFingerprint,
    #[error("storage collaborator failed: {0}")]
    Storage(String),
    #[error("ledger write failed: {0}")]
    Persistence(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::InvalidCredentials
            | Self::MissingToken
            | Self::TokenExpired
            | Self::TokenMalformed => ErrorKind::Unauthenticated,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::DuplicateEmail | Self::DuplicateFingerprint => ErrorKind::Conflict,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Persistence(_) => ErrorKind::Persistence,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<ContractViolation> for CoreError {
    fn from(value: ContractViolation) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<FileRuleViolation> for CoreError {
    fn from(value: FileRuleViolation) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<AccessDenied> for CoreError {
    fn from(value: AccessDenied) -> Self {
        Self::Unauthorized(value.reason)
    }
}

impl From<TokenError> for CoreError {
    fn from(value: TokenError) -> Self {
        match value {
            TokenError::Expired => Self::TokenExpired,
            _ => Self::TokenMalformed,
        }
    }
}

impl From<GatewayError> for CoreError {
    fn from(value: GatewayError) -> Self {
        Self::Storage(value.to_string())
    }
}

impl From<StorageError> for CoreError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::DuplicateKey {
                table: "users.email",
                ..
            } => Self::DuplicateEmail,
            StorageError::DuplicateKey {
                table: "original_records.fingerprint",
                ..
            } => Self::DuplicateFingerprint,
            StorageError::NotFound { table, key } => Self::NotFound {
                entity: entity_for_table(table),
                id: key,
            },
            StorageError::ForeignKeyViolation { table, key } => Self::NotFound {
                entity: entity_for_table(table),
                id: key,
            },
            StorageError::ContractViolation(violation) => violation.into(),
            other @ (StorageError::DuplicateKey { .. }
            | StorageError::Journal(_)
            | StorageError::LockPoisoned) => Self::Persistence(other.to_string()),
        }
    }
}

fn entity_for_table(table: &'static str) -> &'static str {
    match table {
        "certificates" => "certificate",
        "certificates.owner_id" | "certificates.verified_by" | "users" => "user",
        "original_records" => "original record",
        _ => table,
    }
}
