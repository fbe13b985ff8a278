#![forbid(unsafe_code)]

use std::sync::Arc;

use certus_contracts::identity::{
    Claims, EmailAddress, Role, UserId, UserRecord, UserSummary,
};
use certus_engines::access;
use certus_engines::password::{PasswordHashError, PasswordHasher};
use certus_engines::token::TokenSigner;
use certus_storage::repo::IdentityRepo;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::CoreError;
use crate::ids::new_user_id;

/// A signed token together with the claims it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub claims: Claims,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Created(UserSummary),
    AlreadyPresent(UserSummary),
}

pub struct IdentityLedger {
    users: Arc<dyn IdentityRepo>,
    hasher: PasswordHasher,
    signer: TokenSigner,
    clock: Arc<dyn Clock>,
}

impl IdentityLedger {
    pub fn new(
        users: Arc<dyn IdentityRepo>,
        hasher: PasswordHasher,
        signer: TokenSigner,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            hasher,
            signer,
            clock,
        }
    }

    /// Creates a `user`-role account. The email is unique case-insensitively.
    pub fn register(&self, name: &str, email: &str, password: &str) -> Result<UserSummary, CoreError> {
        self.create_account(name, email, password, Role::User)
    }

    /// Creates the admin account unless one with this email already exists.
    pub fn bootstrap_admin(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<BootstrapOutcome, CoreError> {
        let parsed = EmailAddress::parse(email)?;
        if let Some(existing) = self.users.user_row_by_email(&parsed)? {
            if existing.role != Role::Admin {
                warn!(
                    email = parsed.as_str(),
                    "bootstrap admin email belongs to a non-admin account"
                );
            }
            return Ok(BootstrapOutcome::AlreadyPresent(existing.summary()));
        }
        let created = self.create_account(name, email, password, Role::Admin)?;
        Ok(BootstrapOutcome::Created(created))
    }

    fn create_account(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<UserSummary, CoreError> {
        if name.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
            return Err(CoreError::validation("name, email and password are required"));
        }
        let email = EmailAddress::parse(email)?;
        if self.users.user_row_by_email(&email)?.is_some() {
            return Err(CoreError::DuplicateEmail);
        }
        let password_hash = self.hasher.hash(password).map_err(hash_error)?;
        let record = UserRecord::v1(
            new_user_id()?,
            name.to_string(),
            email,
            password_hash,
            role,
            self.clock.now(),
        )?;
        let summary = record.summary();
        self.users.insert_user_row(record)?;
        info!(
            user_id = summary.user_id.as_str(),
            email = summary.email.as_str(),
            role = summary.role.as_str(),
            "account registered"
        );
        Ok(summary)
    }

    /// Unknown email and wrong password produce the same error.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<Session, CoreError> {
        let Ok(email) = EmailAddress::parse(email) else {
            self.hasher.burn_equivalent_work(password);
            return Err(CoreError::InvalidCredentials);
        };
        let Some(user) = self.users.user_row_by_email(&email)? else {
            self.hasher.burn_equivalent_work(password);
            warn!(email = email.as_str(), "login failed");
            return Err(CoreError::InvalidCredentials);
        };
        let matches = match self.hasher.verify(password, &user.password_hash) {
            Ok(matches) => matches,
            Err(err) => {
                warn!(user_id = user.user_id.as_str(), error = %err, "stored password hash unusable");
                false
            }
        };
        if !matches {
            warn!(email = email.as_str(), "login failed");
            return Err(CoreError::InvalidCredentials);
        }
        let claims = Claims::for_user(&user, self.clock.now(), self.signer.ttl_secs());
        let token = self.signer.issue(&claims)?;
        info!(user_id = user.user_id.as_str(), "login succeeded");
        Ok(Session { token, claims })
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, CoreError> {
        if token.trim().is_empty() {
            return Err(CoreError::MissingToken);
        }
        Ok(self.signer.verify(token, self.clock.now())?)
    }

    pub fn list_users(&self, claims: &Claims) -> Result<Vec<UserSummary>, CoreError> {
        access::require_admin(claims)?;
        Ok(self
            .users
            .user_rows_newest_first()?
            .iter()
            .map(UserRecord::summary)
            .collect())
    }

    pub fn user_summary(&self, user_id: &UserId) -> Result<Option<UserSummary>, CoreError> {
        Ok(self.users.user_row(user_id)?.map(|u| u.summary()))
    }
}

fn hash_error(err: PasswordHashError) -> CoreError {
    match err {
        PasswordHashError::EmptyPassword => CoreError::validation(err.to_string()),
        PasswordHashError::TooFewRounds { .. } | PasswordHashError::MalformedHash => {
            CoreError::Persistence(err.to_string())
        }
    }
}
