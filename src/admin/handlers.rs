use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::admin::error::ApiError;
use crate::exec::Validation;
use crate::haproxy::model::{ConfigDocument, ListenSection, SectionKind};
use crate::haproxy::pipeline::MutationOutcome;
use crate::haproxy::render::{BackendSpec, FrontendSpec};
use crate::haproxy::store::BackupEntry;
use crate::haproxy::{graph, VisualizationGraph};
use crate::hosting::domains::{self, AvailableDomain, DomainRequest};
use crate::hosting::{self, UserBackend};
use crate::http::server::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;

fn payload<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(inner)| inner)
        .map_err(|rejection| ApiError::bad_request("Invalid request body").with_details(rejection.body_text()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigBody {
    pub config: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SectionBody {
    pub config: String,
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub installed: bool,
    pub status: Option<Value>,
    pub config: Option<ConfigDocument>,
    #[serde(rename = "statsInfo")]
    pub stats_info: Option<ListenSection>,
}

#[derive(Debug, Serialize)]
pub struct RawConfig {
    pub config: String,
}

#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub outcome: MutationOutcome,
}

impl MutationResponse {
    fn new(message: impl Into<String>, outcome: MutationOutcome) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            outcome,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub output: String,
}

#[derive(Debug, Serialize)]
pub struct RestartResponse {
    pub success: bool,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DomainResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct AvailableDomains {
    pub domains: Vec<AvailableDomain>,
}

#[derive(Debug, Serialize)]
pub struct SectionResponse {
    pub kind: SectionKind,
    pub name: String,
    pub config: String,
}

/// Parsed config plus the panel's live status. An unavailable status
/// command means the load balancer is not installed.
pub async fn get_status(State(state): State<AppState>) -> ApiResult<StatusResponse> {
    let status = match hosting::haproxy_status(state.runner.as_ref()).await {
        Ok(status) => status,
        Err(e) => {
            tracing::info!(error = %e, "HAProxy status unavailable, reporting not installed");
            return Ok(Json(StatusResponse {
                installed: false,
                status: None,
                config: None,
                stats_info: None,
            }));
        }
    };

    let store = state.pipeline.store();
    let config = if store.exists() {
        store
            .read()
            .inspect_err(|e| tracing::error!(error = %e, "Failed to read config for status"))
            .ok()
    } else {
        None
    };
    let stats_info = config.as_ref().and_then(|c| c.stats_info().cloned());

    Ok(Json(StatusResponse {
        installed: true,
        status: Some(status),
        config,
        stats_info,
    }))
}

pub async fn get_raw_config(State(state): State<AppState>) -> ApiResult<RawConfig> {
    let store = state.pipeline.store();
    if !store.exists() {
        return Err(ApiError::not_found("Config file not found"));
    }
    Ok(Json(RawConfig {
        config: store.read_raw()?,
    }))
}

pub async fn put_raw_config(
    State(state): State<AppState>,
    body: Result<Json<ConfigBody>, JsonRejection>,
) -> ApiResult<MutationResponse> {
    let body = payload(body)?;
    let outcome = state.pipeline.replace_config(&body.config).await?;
    Ok(MutationResponse::new("Configuration saved", outcome))
}

/// Check without touching the live file. A rejected config is a normal
/// `{valid: false}` answer, not an error.
pub async fn validate_config(
    State(state): State<AppState>,
    body: Result<Json<ConfigBody>, JsonRejection>,
) -> ApiResult<ValidateResponse> {
    let body = payload(body)?;
    let verdict = state.pipeline.validate_only(&body.config).await?;
    Ok(Json(ValidateResponse {
        valid: verdict.is_valid(),
        output: match verdict {
            Validation::Valid { output } => output,
            Validation::Invalid { diagnostics } => diagnostics,
        },
    }))
}

pub async fn get_visualization(State(state): State<AppState>) -> ApiResult<VisualizationGraph> {
    let store = state.pipeline.store();
    if !store.exists() {
        return Err(ApiError::not_found("Config file not found"));
    }
    Ok(Json(graph::project(&store.read()?)))
}

pub async fn add_frontend(
    State(state): State<AppState>,
    body: Result<Json<FrontendSpec>, JsonRejection>,
) -> ApiResult<MutationResponse> {
    let spec = payload(body)?;
    let outcome = state.pipeline.add_frontend(&spec).await?;
    Ok(MutationResponse::new("Frontend added successfully", outcome))
}

pub async fn delete_frontend(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<MutationResponse> {
    let outcome = state.pipeline.remove_section(SectionKind::Frontend, &name).await?;
    Ok(MutationResponse::new("Frontend deleted successfully", outcome))
}

pub async fn add_backend(
    State(state): State<AppState>,
    body: Result<Json<BackendSpec>, JsonRejection>,
) -> ApiResult<MutationResponse> {
    let spec = payload(body)?;
    let outcome = state.pipeline.add_backend(&spec).await?;
    Ok(MutationResponse::new("Backend added successfully", outcome))
}

pub async fn delete_backend(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<MutationResponse> {
    let outcome = state.pipeline.remove_section(SectionKind::Backend, &name).await?;
    Ok(MutationResponse::new("Backend deleted successfully", outcome))
}

pub async fn restart(State(state): State<AppState>) -> ApiResult<RestartResponse> {
    state.pipeline.restart().await?;
    Ok(Json(RestartResponse {
        success: true,
        message: "HAProxy restarted successfully",
    }))
}

pub async fn get_user_backends(State(state): State<AppState>) -> ApiResult<Vec<UserBackend>> {
    Ok(Json(hosting::user_backends(state.runner.as_ref()).await?))
}

pub async fn get_backups(State(state): State<AppState>) -> ApiResult<Vec<BackupEntry>> {
    Ok(Json(state.pipeline.store().list_backups()?))
}

fn proxy_kind(kind: &str) -> Result<SectionKind, ApiError> {
    kind.parse::<SectionKind>()
        .ok()
        .filter(|k| k.is_proxy())
        .ok_or_else(|| ApiError::bad_request(format!("Unsupported section kind '{kind}'")))
}

pub async fn get_section(
    State(state): State<AppState>,
    Path((kind, name)): Path<(String, String)>,
) -> ApiResult<SectionResponse> {
    let kind = proxy_kind(&kind)?;
    let config = state.pipeline.read_section(kind, &name)?;
    Ok(Json(SectionResponse { kind, name, config }))
}

pub async fn put_section(
    State(state): State<AppState>,
    Path((kind, name)): Path<(String, String)>,
    body: Result<Json<SectionBody>, JsonRejection>,
) -> ApiResult<MutationResponse> {
    let kind = proxy_kind(&kind)?;
    let body = payload(body)?;
    let outcome = state
        .pipeline
        .replace_section(kind, &name, body.name.as_deref(), &body.config)
        .await?;
    Ok(MutationResponse::new(format!("{} saved", kind.keyword()), outcome))
}

pub async fn list_user_domains(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> ApiResult<Value> {
    Ok(Json(domains::list(state.runner.as_ref(), &user).await))
}

pub async fn get_available_domains(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> ApiResult<AvailableDomains> {
    let domains = domains::available(state.runner.as_ref(), &user).await?;
    Ok(Json(AvailableDomains { domains }))
}

pub async fn add_user_domain(
    State(state): State<AppState>,
    Path(user): Path<String>,
    body: Result<Json<DomainRequest>, JsonRejection>,
) -> ApiResult<DomainResponse> {
    let request = payload(body)?;
    let domain = domains::add(state.runner.as_ref(), &user, &request).await?;
    Ok(Json(DomainResponse {
        success: true,
        message: format!("Domain {domain} added to HAProxy"),
    }))
}

pub async fn update_user_domain(
    State(state): State<AppState>,
    Path((user, domain)): Path<(String, String)>,
    body: Result<Json<DomainRequest>, JsonRejection>,
) -> ApiResult<DomainResponse> {
    let request = payload(body)?;
    domains::change(state.runner.as_ref(), &user, &domain, &request).await?;
    Ok(Json(DomainResponse {
        success: true,
        message: format!("Domain {domain} updated"),
    }))
}

pub async fn delete_user_domain(
    State(state): State<AppState>,
    Path((user, domain)): Path<(String, String)>,
) -> ApiResult<DomainResponse> {
    domains::delete(state.runner.as_ref(), &user, &domain).await?;
    Ok(Json(DomainResponse {
        success: true,
        message: format!("Domain {domain} removed from HAProxy"),
    }))
}
