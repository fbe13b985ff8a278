#![forbid(unsafe_code)]

use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64URL;
use base64::Engine;
use certus_contracts::identity::Claims;
use certus_contracts::{UnixTimeMs, Validate};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const MIN_SECRET_LEN: usize = 32;
pub const MIN_TTL_SECS: u64 = 60;
pub const MAX_TTL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token has expired")]
    Expired,
    #[error("token secret must be at least {min} bytes")]
    WeakSecret { min: usize },
    #[error("token ttl must be within {min}..={max} seconds")]
    TtlOutOfRange { min: u64, max: u64 },
    #[error("failed to encode token claims")]
    Encode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenConfig {
    pub ttl_secs: u64,
}

impl TokenConfig {
    pub fn mvp_v1() -> Self {
        Self {
            ttl_secs: 24 * 60 * 60,
        }
    }
}

/// Issues and checks `base64url(claims_json).base64url(hmac_sha256)` bearer tokens.
#[derive(Clone)]
pub struct TokenSigner {
    key: Vec<u8>,
    config: TokenConfig,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("key", &"<redacted>")
            .field("config", &self.config)
            .finish()
    }
}

impl TokenSigner {
    pub fn new(secret: &[u8], config: TokenConfig) -> Result<Self, TokenError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(TokenError::WeakSecret {
                min: MIN_SECRET_LEN,
            });
        }
        if !(MIN_TTL_SECS..=MAX_TTL_SECS).contains(&config.ttl_secs) {
            return Err(TokenError::TtlOutOfRange {
                min: MIN_TTL_SECS,
                max: MAX_TTL_SECS,
            });
        }
        Ok(Self {
            key: secret.to_vec(),
            config,
        })
    }

    pub fn ttl_secs(&self) -> u64 {
        self.config.ttl_secs
    }

    pub fn issue(&self, claims: &Claims) -> Result<String, TokenError> {
        claims.validate().map_err(|_| TokenError::Encode)?;
        let payload = serde_json::to_vec(claims).map_err(|_| TokenError::Encode)?;
        let body = B64URL.encode(payload);
        let tag = self.tag(body.as_bytes())?;
        Ok(format!("{body}.{}", B64URL.encode(tag)))
    }

    /// Signature is checked before the payload is parsed; expiry after.
    pub fn verify(&self, token: &str, now: UnixTimeMs) -> Result<Claims, TokenError> {
        let (body, sig) = token.trim().split_once('.').ok_or(TokenError::Malformed)?;
        if body.is_empty() || sig.is_empty() || sig.contains('.') {
            return Err(TokenError::Malformed);
        }
        let presented = B64URL.decode(sig).map_err(|_| TokenError::Malformed)?;
        self.mac(body.as_bytes())?
            .verify_slice(&presented)
            .map_err(|_| TokenError::Malformed)?;
        let payload = B64URL.decode(body).map_err(|_| TokenError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;
        claims.validate().map_err(|_| TokenError::Malformed)?;
        if claims.is_expired_at(now) {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    fn mac(&self, body: &[u8]) -> Result<HmacSha256, TokenError> {
        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(|_| TokenError::Malformed)?;
        mac.update(body);
        Ok(mac)
    }

    fn tag(&self, body: &[u8]) -> Result<Vec<u8>, TokenError> {
        Ok(self.mac(body)?.finalize().into_bytes().to_vec())
    }
}
