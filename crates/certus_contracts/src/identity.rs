#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::common::{validate_id, validate_text};
use crate::{ContractViolation, SchemaVersion, UnixTimeMs, Validate};

pub const IDENTITY_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

pub const USER_NAME_MAX_LEN: usize = 128;
pub const EMAIL_MAX_LEN: usize = 254;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for UserId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("user_id", &self.0, 64)
    }
}

/// Case-normalized email address. Two addresses differing only in case are equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn parse(raw: &str) -> Result<Self, ContractViolation> {
        let v = Self(raw.trim().to_lowercase());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for EmailAddress {
    fn validate(&self) -> Result<(), ContractViolation> {
        let email = self.0.as_str();
        if email.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "email",
                reason: "must not be empty",
            });
        }
        if email.len() > EMAIL_MAX_LEN {
            return Err(ContractViolation::InvalidLength {
                field: "email",
                max: EMAIL_MAX_LEN,
                got: email.len(),
            });
        }
        if email != email.to_lowercase() {
            return Err(ContractViolation::InvalidValue {
                field: "email",
                reason: "must be lowercase-normalized",
            });
        }
        if email.chars().any(char::is_whitespace) {
            return Err(ContractViolation::InvalidValue {
                field: "email",
                reason: "must not contain whitespace",
            });
        }
        match email.split_once('@') {
            Some((local, domain))
                if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
            {
                Ok(())
            }
            _ => Err(ContractViolation::InvalidValue {
                field: "email",
                reason: "must have the form local@domain",
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub schema_version: SchemaVersion,
    pub user_id: UserId,
    pub name: String,
    pub email: EmailAddress,
    /// Encoded salted one-way hash; never the raw password.
    pub password_hash: String,
    pub role: Role,
    pub created_at: UnixTimeMs,
}

impl UserRecord {
    pub fn v1(
        user_id: UserId,
        name: String,
        email: EmailAddress,
        password_hash: String,
        role: Role,
        created_at: UnixTimeMs,
    ) -> Result<Self, ContractViolation> {
        let record = Self {
            schema_version: IDENTITY_CONTRACT_VERSION,
            user_id,
            name: name.trim().to_string(),
            email,
            password_hash,
            role,
            created_at,
        };
        record.validate()?;
        Ok(record)
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            user_id: self.user_id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            created_at: self.created_at,
        }
    }
}

impl Validate for UserRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != IDENTITY_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "user_record.schema_version",
                reason: "unsupported schema version",
            });
        }
        self.user_id.validate()?;
        validate_text("user_record.name", &self.name, USER_NAME_MAX_LEN)?;
        self.email.validate()?;
        if self.password_hash.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "user_record.password_hash",
                reason: "must not be empty",
            });
        }
        Ok(())
    }
}

/// User projection safe to hand to clients: the password hash is not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub user_id: UserId,
    pub name: String,
    pub email: EmailAddress,
    pub role: Role,
    pub created_at: UnixTimeMs,
}

/// Verified payload of a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: UserId,
    pub email: EmailAddress,
    pub name: String,
    pub role: Role,
    pub issued_at: UnixTimeMs,
    pub expires_at: UnixTimeMs,
}

impl Claims {
    pub fn for_user(user: &UserRecord, issued_at: UnixTimeMs, ttl_secs: u64) -> Self {
        Self {
            user_id: user.user_id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            issued_at,
            expires_at: issued_at.saturating_add_secs(ttl_secs),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_expired_at(&self, now: UnixTimeMs) -> bool {
        now >= self.expires_at
    }
}

impl Validate for Claims {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.user_id.validate()?;
        self.email.validate()?;
        if self.expires_at <= self.issued_at {
            return Err(ContractViolation::InvalidValue {
                field: "claims.expires_at",
                reason: "must be after issued_at",
            });
        }
        Ok(())
    }
}
