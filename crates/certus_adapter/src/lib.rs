#![forbid(unsafe_code)]

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use certus_contracts::certificate::{CertificateId, CertificateRecord, RequestedVerdict};
use certus_contracts::identity::{Claims, UserSummary};
use certus_contracts::registry::OriginalRecord;
use certus_contracts::verdict::VerdictReason;
use certus_contracts::UnixTimeMs;
use certus_engines::access;
use certus_engines::file_rules::{UploadRulesConfig, DEFAULT_MAX_UPLOAD_BYTES};
use certus_engines::password::{PasswordHasherConfig, MIN_ROUNDS};
use certus_engines::token::{TokenConfig, MAX_TTL_SECS, MIN_SECRET_LEN, MIN_TTL_SECS};
use certus_os::certificates::CertificateWithOwner;
use certus_os::clock::{Clock, SystemClock};
use certus_os::identity::BootstrapOutcome;
use certus_os::registry::parse_seed_file;
use certus_os::upload::UploadRequest;
use certus_os::{CoreConfig, CoreError, CoreServices, ErrorKind};
use certus_storage::gateway::LocalDiskGateway;
use certus_storage::{LedgerStore, StorageGateway};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const DEV_TOKEN_SECRET: &str = "certus-dev-only-token-secret-do-not-deploy";
const DEFAULT_BIND: &str = "127.0.0.1:5000";
const DEFAULT_ADMIN_NAME: &str = "Administrator";

#[derive(Clone, PartialEq, Eq)]
pub struct BootstrapAdminConfig {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapAdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdminConfig")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    pub bind: SocketAddr,
    pub token_secret: Vec<u8>,
    pub token_ttl_secs: u64,
    pub password_rounds: u32,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub store_path: Option<PathBuf>,
    pub collaborator_timeout: Duration,
    pub bootstrap_admin: Option<BootstrapAdminConfig>,
    pub registry_seed_path: Option<PathBuf>,
}

impl std::fmt::Debug for AdapterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterConfig")
            .field("bind", &self.bind)
            .field("token_secret", &"<redacted>")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("password_rounds", &self.password_rounds)
            .field("upload_dir", &self.upload_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("store_path", &self.store_path)
            .field("collaborator_timeout", &self.collaborator_timeout)
            .field("bootstrap_admin", &self.bootstrap_admin)
            .field("registry_seed_path", &self.registry_seed_path)
            .finish()
    }
}

impl AdapterConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_env_var_map(|key| env::var(key).ok())
    }

    pub fn from_env_var_map<F>(mut env_getter: F) -> Result<Self, String>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut get = |key: &str| {
            env_getter(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind_raw = get("CERTUS_HTTP_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind_raw
            .parse()
            .map_err(|err| format!("CERTUS_HTTP_BIND '{bind_raw}' is not a socket address: {err}"))?;

        let token_secret = match get("CERTUS_TOKEN_SECRET") {
            Some(secret) if secret.len() >= MIN_SECRET_LEN => secret.into_bytes(),
            Some(_) => {
                return Err(format!(
                    "CERTUS_TOKEN_SECRET must be at least {MIN_SECRET_LEN} bytes"
                ))
            }
            None if get("CERTUS_ALLOW_DEV_SECRET").as_deref() == Some("1") => {
                warn!("CERTUS_TOKEN_SECRET unset; using the development secret");
                DEV_TOKEN_SECRET.as_bytes().to_vec()
            }
            None => {
                return Err(
                    "CERTUS_TOKEN_SECRET is required (set CERTUS_ALLOW_DEV_SECRET=1 for local development)"
                        .to_string(),
                )
            }
        };

        let token_ttl_secs = parse_in_range(
            "CERTUS_TOKEN_TTL_SECS",
            get("CERTUS_TOKEN_TTL_SECS"),
            TokenConfig::mvp_v1().ttl_secs,
            MIN_TTL_SECS,
            MAX_TTL_SECS,
        )?;
        let password_rounds = parse_in_range(
            "CERTUS_PASSWORD_ROUNDS",
            get("CERTUS_PASSWORD_ROUNDS"),
            u64::from(PasswordHasherConfig::mvp_v1().rounds),
            u64::from(MIN_ROUNDS),
            u64::from(u32::MAX),
        )? as u32;
        let max_upload_bytes = parse_in_range(
            "CERTUS_MAX_UPLOAD_BYTES",
            get("CERTUS_MAX_UPLOAD_BYTES"),
            DEFAULT_MAX_UPLOAD_BYTES,
            1,
            1024 * 1024 * 1024,
        )?;
        let collaborator_timeout_ms = parse_in_range(
            "CERTUS_COLLABORATOR_TIMEOUT_MS",
            get("CERTUS_COLLABORATOR_TIMEOUT_MS"),
            5_000,
            100,
            60_000,
        )?;

        let bootstrap_admin = match (
            get("CERTUS_BOOTSTRAP_ADMIN_EMAIL"),
            get("CERTUS_BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(BootstrapAdminConfig {
                name: get("CERTUS_BOOTSTRAP_ADMIN_NAME")
                    .unwrap_or_else(|| DEFAULT_ADMIN_NAME.to_string()),
                email,
                password,
            }),
            (None, None) => None,
            _ => {
                return Err(
                    "CERTUS_BOOTSTRAP_ADMIN_EMAIL and CERTUS_BOOTSTRAP_ADMIN_PASSWORD must be set together"
                        .to_string(),
                )
            }
        };

        Ok(Self {
            bind,
            token_secret,
            token_ttl_secs,
            password_rounds,
            upload_dir: get("CERTUS_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./uploads")),
            max_upload_bytes,
            store_path: get("CERTUS_STORE_PATH").map(PathBuf::from),
            collaborator_timeout: Duration::from_millis(collaborator_timeout_ms),
            bootstrap_admin,
            registry_seed_path: get("CERTUS_REGISTRY_SEED_PATH").map(PathBuf::from),
        })
    }

    pub fn core_config(&self) -> CoreConfig {
        CoreConfig {
            password: PasswordHasherConfig {
                rounds: self.password_rounds,
                ..PasswordHasherConfig::mvp_v1()
            },
            token: TokenConfig {
                ttl_secs: self.token_ttl_secs,
            },
            token_secret: self.token_secret.clone(),
            upload: UploadRulesConfig {
                max_upload_bytes: self.max_upload_bytes,
            },
        }
    }

    /// Request body ceiling: base64 inflates the file by 4/3, plus room for the other fields.
    pub fn max_request_body_bytes(&self) -> usize {
        let encoded = self.max_upload_bytes.saturating_mul(4) / 3 + 4;
        usize::try_from(encoded.saturating_add(64 * 1024)).unwrap_or(usize::MAX)
    }
}

fn parse_in_range(
    key: &str,
    raw: Option<String>,
    default: u64,
    min: u64,
    max: u64,
) -> Result<u64, String> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let value: u64 = raw
        .parse()
        .map_err(|_| format!("{key} must be an unsigned integer (got '{raw}')"))?;
    if !(min..=max).contains(&value) {
        return Err(format!("{key} must be within {min}..={max} (got {value})"));
    }
    Ok(value)
}

/// Error as seen by HTTP clients: a kind and a human-readable summary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct AdapterError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AdapterError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        status_for_kind(self.kind)
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            status: "error".to_string(),
            kind: self.kind.as_str().to_string(),
            message: self.message.clone(),
        }
    }
}

impl From<CoreError> for AdapterError {
    fn from(value: CoreError) -> Self {
        let kind = value.kind();
        // Internal detail stays in the log.
        let message = match kind {
            ErrorKind::Persistence => {
                warn!(error = %value, "ledger write failed");
                "the request could not be recorded; try again later".to_string()
            }
            ErrorKind::Storage => {
                warn!(error = %value, "storage collaborator failed");
                "file storage is unavailable; try again later".to_string()
            }
            _ => value.to_string(),
        };
        Self { kind, message }
    }
}

pub fn status_for_kind(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation | ErrorKind::Conflict => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Storage => StatusCode::BAD_GATEWAY,
        ErrorKind::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: String,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadCertificateRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub file_name: String,
    #[serde(default)]
    pub content_type: Option<String>,
    pub file_base64: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyRequest {
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterOriginalRequest {
    pub title: String,
    pub file_ref: String,
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: String,
}

impl From<&UserSummary> for UserView {
    fn from(user: &UserSummary) -> Self {
        Self {
            id: user.user_id.as_str().to_string(),
            name: user.name.clone(),
            email: user.email.as_str().to_string(),
            role: user.role.as_str().to_string(),
            created_at: rfc3339(user.created_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub size_bytes: u64,
    pub fingerprint: String,
    pub status: String,
    pub owner_id: String,
    pub uploaded_at: String,
    pub verified_at: Option<String>,
    pub verified_by: Option<String>,
}

impl From<&CertificateRecord> for CertificateView {
    fn from(record: &CertificateRecord) -> Self {
        Self {
            id: record.certificate_id.as_str().to_string(),
            title: record.title.clone(),
            description: record.description.clone(),
            file_name: record.file.file_name.clone(),
            content_type: record.file.content_type.clone(),
            size_bytes: record.file.size_bytes,
            fingerprint: record.fingerprint.as_str().to_string(),
            status: record.status.as_str().to_string(),
            owner_id: record.owner_id.as_str().to_string(),
            uploaded_at: rfc3339(record.uploaded_at),
            verified_at: record.verified_at.map(rfc3339),
            verified_by: record.verified_by.as_ref().map(|u| u.as_str().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCertificateView {
    #[serde(flatten)]
    pub certificate: CertificateView,
    pub user_name: String,
    pub user_email: String,
}

impl From<&CertificateWithOwner> for AdminCertificateView {
    fn from(row: &CertificateWithOwner) -> Self {
        let (user_name, user_email) = match &row.owner {
            Some(owner) => (owner.name.clone(), owner.email.as_str().to_string()),
            None => ("Unknown".to_string(), "Unknown".to_string()),
        };
        Self {
            certificate: CertificateView::from(&row.certificate),
            user_name,
            user_email,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalRecordView {
    pub id: String,
    pub title: String,
    pub fingerprint: String,
    pub file_ref: String,
    pub registered_at: String,
}

impl From<&OriginalRecord> for OriginalRecordView {
    fn from(record: &OriginalRecord) -> Self {
        Self {
            id: record.original_id.as_str().to_string(),
            title: record.title.clone(),
            fingerprint: record.fingerprint.as_str().to_string(),
            file_ref: record.file_ref.as_str().to_string(),
            registered_at: rfc3339(record.registered_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub status: String,
    pub message: String,
    pub user: UserView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub status: String,
    pub token: String,
    pub expires_at: String,
    pub user: UserView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateResponse {
    pub status: String,
    pub certificate: CertificateView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateListResponse {
    pub status: String,
    pub certificates: Vec<CertificateView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCertificateListResponse {
    pub status: String,
    pub certificates: Vec<AdminCertificateView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserListResponse {
    pub status: String,
    pub users: Vec<UserView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictResponse {
    pub status: String,
    pub certificate: CertificateView,
    pub reason: VerdictReason,
    pub summary: String,
    pub applied: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalRecordResponse {
    pub status: String,
    pub original: OriginalRecordView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub store: String,
    pub users: usize,
    pub certificates: usize,
    pub original_records: usize,
    pub timestamp: String,
}

fn ok() -> String {
    "ok".to_string()
}

pub fn rfc3339(t: UnixTimeMs) -> String {
    i64::try_from(t.0)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let value = header?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn decode_file_base64(raw: &str, max_upload_bytes: u64) -> Result<Vec<u8>, AdapterError> {
    let payload = match raw.trim().strip_prefix("data:") {
        Some(data_url) => data_url
            .split_once(',')
            .map(|(_, b64)| b64)
            .ok_or_else(|| AdapterError::new(ErrorKind::Validation, "file_base64 data URL has no payload"))?,
        None => raw.trim(),
    };
    let encoded_ceiling = max_upload_bytes.saturating_mul(4) / 3 + 4;
    if payload.len() as u64 > encoded_ceiling {
        return Err(AdapterError::new(
            ErrorKind::Validation,
            format!("file exceeds the {max_upload_bytes} byte limit"),
        ));
    }
    BASE64
        .decode(payload)
        .map_err(|_| AdapterError::new(ErrorKind::Validation, "file_base64 is not valid base64"))
}

/// Ids that cannot exist are reported as absent.
fn parse_certificate_id(raw: &str) -> Result<CertificateId, AdapterError> {
    CertificateId::new(raw.trim()).map_err(|_| {
        AdapterError::new(ErrorKind::NotFound, format!("certificate '{raw}' not found"))
    })
}

/// Services behind the HTTP surface. Built once at startup.
pub struct AdapterRuntime {
    core: CoreServices,
    store_kind: &'static str,
    max_upload_bytes: u64,
}

impl AdapterRuntime {
    pub fn default_from_env() -> Result<Self, String> {
        Self::from_config(&AdapterConfig::from_env()?)
    }

    pub fn from_config(config: &AdapterConfig) -> Result<Self, String> {
        let store = match &config.store_path {
            Some(path) => LedgerStore::open_with_journal(path)
                .map_err(|err| format!("failed to open ledger store: {err}"))?,
            None => {
                warn!("CERTUS_STORE_PATH unset; ledger state is in-memory only");
                LedgerStore::new_in_memory()
            }
        };
        let gateway = LocalDiskGateway::open(&config.upload_dir).map_err(|err| {
            format!(
                "failed to open upload directory '{}': {}",
                config.upload_dir.display(),
                err
            )
        })?;
        Self::with_parts(
            Arc::new(store),
            Arc::new(gateway),
            Arc::new(SystemClock),
            config,
        )
    }

    pub fn with_parts(
        store: Arc<LedgerStore>,
        gateway: Arc<dyn StorageGateway>,
        clock: Arc<dyn Clock>,
        config: &AdapterConfig,
    ) -> Result<Self, String> {
        let store_kind = if store.is_durable() { "journal" } else { "memory" };
        let core = CoreServices::wire(store, gateway, clock, config.core_config())
            .map_err(|err| format!("failed to wire services: {err}"))?;
        let runtime = Self {
            core,
            store_kind,
            max_upload_bytes: config.max_upload_bytes,
        };
        if let Some(admin) = &config.bootstrap_admin {
            runtime.bootstrap_admin(admin)?;
        }
        if let Some(path) = &config.registry_seed_path {
            runtime.import_registry_seed(path)?;
        }
        Ok(runtime)
    }

    fn bootstrap_admin(&self, admin: &BootstrapAdminConfig) -> Result<(), String> {
        match self
            .core
            .identity
            .bootstrap_admin(&admin.name, &admin.email, &admin.password)
            .map_err(|err| format!("admin bootstrap failed: {err}"))?
        {
            BootstrapOutcome::Created(user) => {
                info!(user_id = user.user_id.as_str(), "bootstrap admin created")
            }
            BootstrapOutcome::AlreadyPresent(user) => {
                info!(user_id = user.user_id.as_str(), "bootstrap admin already present")
            }
        }
        Ok(())
    }

    fn import_registry_seed(&self, path: &Path) -> Result<(), String> {
        let json = fs::read_to_string(path).map_err(|err| {
            format!("failed to read registry seed '{}': {}", path.display(), err)
        })?;
        let entries = parse_seed_file(&json).map_err(|err| err.to_string())?;
        self.core
            .registry
            .seed_all(&entries)
            .map_err(|err| format!("registry seed import failed: {err}"))?;
        Ok(())
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    pub fn authenticate(&self, authorization: Option<&str>) -> Result<Claims, AdapterError> {
        let token = bearer_token(authorization).unwrap_or_default();
        Ok(self.core.identity.validate_token(token)?)
    }

    pub fn register(&self, request: RegisterRequest) -> Result<RegisterResponse, AdapterError> {
        let user = self
            .core
            .identity
            .register(&request.name, &request.email, &request.password)?;
        Ok(RegisterResponse {
            status: ok(),
            message: "registration successful".to_string(),
            user: UserView::from(&user),
        })
    }

    pub fn login(&self, request: LoginRequest) -> Result<LoginResponse, AdapterError> {
        let session = self
            .core
            .identity
            .authenticate(&request.email, &request.password)?;
        let claims = &session.claims;
        Ok(LoginResponse {
            status: ok(),
            expires_at: rfc3339(claims.expires_at),
            user: UserView {
                id: claims.user_id.as_str().to_string(),
                name: claims.name.clone(),
                email: claims.email.as_str().to_string(),
                role: claims.role.as_str().to_string(),
                created_at: self
                    .core
                    .identity
                    .user_summary(&claims.user_id)?
                    .map(|u| rfc3339(u.created_at))
                    .unwrap_or_default(),
            },
            token: session.token,
        })
    }

    pub fn upload_certificate(
        &self,
        claims: &Claims,
        request: UploadCertificateRequest,
    ) -> Result<CertificateResponse, AdapterError> {
        let bytes = decode_file_base64(&request.file_base64, self.max_upload_bytes)?;
        let record = self.core.uploads.upload(
            claims,
            UploadRequest {
                title: request.title,
                description: request.description,
                file_name: request.file_name,
                content_type: request.content_type,
                bytes,
            },
        )?;
        Ok(CertificateResponse {
            status: ok(),
            certificate: CertificateView::from(&record),
        })
    }

    pub fn list_certificates(&self, claims: &Claims) -> Result<CertificateListResponse, AdapterError> {
        let rows = self.core.certificates.list_for(claims)?;
        Ok(CertificateListResponse {
            status: ok(),
            certificates: rows.iter().map(CertificateView::from).collect(),
        })
    }

    pub fn get_certificate(
        &self,
        claims: &Claims,
        certificate_id: &str,
    ) -> Result<CertificateResponse, AdapterError> {
        let id = parse_certificate_id(certificate_id)?;
        let record = self.core.certificates.read_for(claims, &id)?;
        Ok(CertificateResponse {
            status: ok(),
            certificate: CertificateView::from(&record),
        })
    }

    pub fn admin_list_certificates(
        &self,
        claims: &Claims,
    ) -> Result<AdminCertificateListResponse, AdapterError> {
        let rows = self.core.certificates.list_all_with_owners(claims)?;
        Ok(AdminCertificateListResponse {
            status: ok(),
            certificates: rows.iter().map(AdminCertificateView::from).collect(),
        })
    }

    pub fn adjudicate(
        &self,
        claims: &Claims,
        certificate_id: &str,
        request: VerifyRequest,
    ) -> Result<VerdictResponse, AdapterError> {
        // Non-admins learn nothing about the request shape.
        access::require_admin(claims).map_err(CoreError::from)?;
        let requested = RequestedVerdict::parse(&request.status).map_err(CoreError::from)?;
        let id = parse_certificate_id(certificate_id)?;
        let outcome = self
            .core
            .verification
            .adjudicate(claims, &id, requested)?;
        Ok(VerdictResponse {
            status: ok(),
            certificate: CertificateView::from(&outcome.certificate),
            summary: outcome.reason.summary(),
            reason: outcome.reason,
            applied: outcome.applied,
        })
    }

    pub fn admin_list_users(&self, claims: &Claims) -> Result<UserListResponse, AdapterError> {
        let users = self.core.identity.list_users(claims)?;
        Ok(UserListResponse {
            status: ok(),
            users: users.iter().map(UserView::from).collect(),
        })
    }

    pub fn register_original(
        &self,
        claims: &Claims,
        request: RegisterOriginalRequest,
    ) -> Result<OriginalRecordResponse, AdapterError> {
        let record = self.core.registry.register_original(
            claims,
            &request.fingerprint,
            &request.title,
            &request.file_ref,
        )?;
        Ok(OriginalRecordResponse {
            status: ok(),
            original: OriginalRecordView::from(&record),
        })
    }

    pub fn health_report(&self) -> Result<HealthResponse, AdapterError> {
        let counts = self.core.table_counts()?;
        Ok(HealthResponse {
            status: ok(),
            store: self.store_kind.to_string(),
            users: counts.users,
            certificates: counts.certificates,
            original_records: counts.original_records,
            timestamp: rfc3339(self.core.clock().now()),
        })
    }
}

/// Runs a read-only call off the async workers. Past `timeout` the caller gets
/// a storage error; the call has no effects to reconcile.
pub async fn run_read<T, F>(
    runtime: Arc<AdapterRuntime>,
    timeout: Duration,
    call: F,
) -> Result<T, AdapterError>
where
    T: Send + 'static,
    F: FnOnce(&AdapterRuntime) -> Result<T, AdapterError> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(move || call(&runtime));
    match tokio::time::timeout(timeout, task).await {
        Ok(joined) => joined.unwrap_or_else(|err| Err(worker_failed(err))),
        Err(_) => Err(AdapterError::new(
            ErrorKind::Storage,
            "a storage collaborator did not respond in time",
        )),
    }
}

/// Runs a mutating call off the async workers and always reports its real
/// outcome. A call that outlives `timeout` is logged and then awaited.
pub async fn run_write<T, F>(
    runtime: Arc<AdapterRuntime>,
    timeout: Duration,
    call: F,
) -> Result<T, AdapterError>
where
    T: Send + 'static,
    F: FnOnce(&AdapterRuntime) -> Result<T, AdapterError> + Send + 'static,
{
    let mut task = tokio::task::spawn_blocking(move || call(&runtime));
    let joined = match tokio::time::timeout(timeout, &mut task).await {
        Ok(joined) => joined,
        Err(_) => {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                "ledger write exceeded collaborator timeout; awaiting its outcome"
            );
            task.await
        }
    };
    joined.unwrap_or_else(|err| Err(worker_failed(err)))
}

fn worker_failed(err: tokio::task::JoinError) -> AdapterError {
    warn!(error = %err, "request worker failed");
    AdapterError::new(ErrorKind::Persistence, "the request could not be completed")
}
