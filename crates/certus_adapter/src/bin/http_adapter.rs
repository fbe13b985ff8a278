#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use certus_adapter::{
    run_read, run_write, AdapterConfig, AdapterError, AdapterRuntime, LoginRequest,
    RegisterOriginalRequest, RegisterRequest, UploadCertificateRequest, VerifyRequest,
};
use certus_os::ErrorKind;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

struct AppState {
    runtime: Arc<AdapterRuntime>,
    collaborator_timeout: Duration,
}

type SharedState = Arc<AppState>;

struct ApiError(AdapterError);

impl From<AdapterError> for ApiError {
    fn from(value: AdapterError) -> Self {
        Self(value)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        Self(AdapterError::new(
            ErrorKind::Validation,
            format!("invalid request body: {}", value.body_text()),
        ))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        warn!(
            status = status.as_u16(),
            kind = self.0.kind.as_str(),
            message = %self.0.message,
            "request failed"
        );
        (status, Json(self.0.body())).into_response()
    }
}

type ApiResult<T> = Result<(StatusCode, Json<T>), ApiError>;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = AdapterConfig::from_env()?;
    let body_limit = config.max_request_body_bytes();
    let state = Arc::new(AppState {
        runtime: Arc::new(AdapterRuntime::from_config(&config)?),
        collaborator_timeout: config.collaborator_timeout,
    });

    let api = Router::new()
        .route("/healthz", get(healthz))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/certificates", post(upload_certificate).get(list_certificates))
        .route("/certificates/:id", get(get_certificate))
        .route("/admin/certificates", get(admin_list_certificates))
        .route("/admin/certificates/:id/verify", put(adjudicate))
        .route("/admin/users", get(admin_list_users))
        .route("/admin/originals", post(register_original));
    let app = Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    info!(addr = %config.bind, "certus_adapter_http listening");
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("certus_adapter_http stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

async fn read<T, F>(state: &SharedState, call: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&AdapterRuntime) -> Result<T, AdapterError> + Send + 'static,
{
    Ok(run_read(state.runtime.clone(), state.collaborator_timeout, call).await?)
}

async fn write<T, F>(state: &SharedState, call: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&AdapterRuntime) -> Result<T, AdapterError> + Send + 'static,
{
    Ok(run_write(state.runtime.clone(), state.collaborator_timeout, call).await?)
}

fn authorization(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn ok<T: Serialize>(status: StatusCode, body: T) -> ApiResult<T> {
    Ok((status, Json(body)))
}

async fn healthz(State(state): State<SharedState>) -> Response {
    match read(&state, |rt| rt.health_report()).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn register(
    State(state): State<SharedState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<certus_adapter::RegisterResponse> {
    let Json(request) = body?;
    let response = write(&state, move |rt| rt.register(request)).await?;
    ok(StatusCode::CREATED, response)
}

async fn login(
    State(state): State<SharedState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<certus_adapter::LoginResponse> {
    let Json(request) = body?;
    let response = read(&state, move |rt| rt.login(request)).await?;
    ok(StatusCode::OK, response)
}

async fn upload_certificate(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Result<Json<UploadCertificateRequest>, JsonRejection>,
) -> ApiResult<certus_adapter::CertificateResponse> {
    let auth = authorization(&headers);
    let Json(request) = body?;
    let response = write(&state, move |rt| {
        let claims = rt.authenticate(auth.as_deref())?;
        rt.upload_certificate(&claims, request)
    })
    .await?;
    ok(StatusCode::CREATED, response)
}

async fn list_certificates(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<certus_adapter::CertificateListResponse> {
    let auth = authorization(&headers);
    let response = read(&state, move |rt| {
        let claims = rt.authenticate(auth.as_deref())?;
        rt.list_certificates(&claims)
    })
    .await?;
    ok(StatusCode::OK, response)
}

async fn get_certificate(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<certus_adapter::CertificateResponse> {
    let auth = authorization(&headers);
    let response = read(&state, move |rt| {
        let claims = rt.authenticate(auth.as_deref())?;
        rt.get_certificate(&claims, &id)
    })
    .await?;
    ok(StatusCode::OK, response)
}

async fn admin_list_certificates(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<certus_adapter::AdminCertificateListResponse> {
    let auth = authorization(&headers);
    let response = read(&state, move |rt| {
        let claims = rt.authenticate(auth.as_deref())?;
        rt.admin_list_certificates(&claims)
    })
    .await?;
    ok(StatusCode::OK, response)
}

async fn adjudicate(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> ApiResult<certus_adapter::VerdictResponse> {
    let auth = authorization(&headers);
    let Json(request) = body?;
    let response = write(&state, move |rt| {
        let claims = rt.authenticate(auth.as_deref())?;
        rt.adjudicate(&claims, &id, request)
    })
    .await?;
    ok(StatusCode::OK, response)
}

async fn admin_list_users(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<certus_adapter::UserListResponse> {
    let auth = authorization(&headers);
    let response = read(&state, move |rt| {
        let claims = rt.authenticate(auth.as_deref())?;
        rt.admin_list_users(&claims)
    })
    .await?;
    ok(StatusCode::OK, response)
}

async fn register_original(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Result<Json<RegisterOriginalRequest>, JsonRejection>,
) -> ApiResult<certus_adapter::OriginalRecordResponse> {
    let auth = authorization(&headers);
    let Json(request) = body?;
    let response = write(&state, move |rt| {
        let claims = rt.authenticate(auth.as_deref())?;
        rt.register_original(&claims, request)
    })
    .await?;
    ok(StatusCode::CREATED, response)
}
