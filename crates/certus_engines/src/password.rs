#![forbid(unsafe_code)]

use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

const SCHEME: &str = "pbkdf2_sha256";
const HASH_LEN: usize = 32;
pub const MIN_ROUNDS: u32 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PasswordHashError {
    #[error("password must not be empty")]
    EmptyPassword,
    #[error("password hashing needs at least {min} rounds (got {got})")]
    TooFewRounds { min: u32, got: u32 },
    #[error("stored password hash is malformed")]
    MalformedHash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordHasherConfig {
    pub rounds: u32,
    pub salt_len: usize,
}

impl PasswordHasherConfig {
    pub fn mvp_v1() -> Self {
        Self {
            rounds: 100_000,
            salt_len: 16,
        }
    }
}

/// Salted PBKDF2-HMAC-SHA256. Encoded as `pbkdf2_sha256$<rounds>$<salt_hex>$<hash_hex>`.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    config: PasswordHasherConfig,
}

impl PasswordHasher {
    pub fn new(config: PasswordHasherConfig) -> Result<Self, PasswordHashError> {
        if config.rounds < MIN_ROUNDS {
            return Err(PasswordHashError::TooFewRounds {
                min: MIN_ROUNDS,
                got: config.rounds,
            });
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> PasswordHasherConfig {
        self.config
    }

    pub fn hash(&self, password: &str) -> Result<String, PasswordHashError> {
        if password.is_empty() {
            return Err(PasswordHashError::EmptyPassword);
        }
        let mut salt = vec![0u8; self.config.salt_len.max(8)];
        OsRng.fill_bytes(&mut salt);
        let derived = derive(password, &salt, self.config.rounds);
        Ok(format!(
            "{SCHEME}${}${}${}",
            self.config.rounds,
            hex::encode(&salt),
            hex::encode(derived)
        ))
    }

    /// Rounds are taken from the encoded hash, so changing the configured
    /// rounds does not invalidate existing accounts.
    pub fn verify(&self, password: &str, encoded: &str) -> Result<bool, PasswordHashError> {
        let mut parts = encoded.split('$');
        let (Some(scheme), Some(rounds), Some(salt_hex), Some(hash_hex), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(PasswordHashError::MalformedHash);
        };
        if scheme != SCHEME {
            return Err(PasswordHashError::MalformedHash);
        }
        let rounds: u32 = rounds
            .parse()
            .map_err(|_| PasswordHashError::MalformedHash)?;
        let salt = hex::decode(salt_hex).map_err(|_| PasswordHashError::MalformedHash)?;
        let expected = hex::decode(hash_hex).map_err(|_| PasswordHashError::MalformedHash)?;
        if rounds == 0 || salt.is_empty() || expected.len() != HASH_LEN {
            return Err(PasswordHashError::MalformedHash);
        }
        let derived = derive(password, &salt, rounds);
        Ok(constant_time_eq(&derived, &expected))
    }

    /// Spends the same derivation cost as a real check. Used when the account
    /// does not exist so that unknown-email and wrong-password take equal time.
    pub fn burn_equivalent_work(&self, password: &str) {
        let salt = [0u8; 16];
        let _ = derive(password, &salt, self.config.rounds);
    }
}

fn derive(password: &str, salt: &[u8], rounds: u32) -> [u8; HASH_LEN] {
    let mut out = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, rounds, &mut out);
    out
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}
