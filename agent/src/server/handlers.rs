//! HTTP request handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use hook_api::{
    ChainDeployResponse, ChainListResponse, ChainSummary, DeployResponse, DryRunConfig,
    DryRunResponse, ErrorResponse, HealthResponse, OutcomeBody, ProjectListResponse,
    ProjectSummary,
};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::deploy::discovery::{directory_exists, list_chains, list_projects, project_count};
use crate::deploy::models::FailureReason;
use crate::deploy::resolver::chain_key;
use crate::errors::HookError;
use crate::server::errors::ApiError;
use crate::server::state::ServerState;
use crate::utils::version_info;

pub const ENDPOINTS: [&str; 6] = [
    "POST /webhook/deploy/{project}",
    "POST /webhook/deploy-chain/{chain?}",
    "GET /webhook/projects",
    "GET /webhook/chains",
    "POST /webhook/test/{project}",
    "GET /health",
];

/// Interpret a webhook body without validating it
///
/// JSON bodies are kept as-is, anything else is echoed back as a string.
pub fn parse_webhook_body(body: &[u8]) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return json!({});
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

async fn project_summaries(state: &ServerState) -> Vec<ProjectSummary> {
    list_projects(state.resolver())
        .await
        .into_iter()
        .map(|project| ProjectSummary {
            name: project.project_id,
            path: project.spec.working_directory.display().to_string(),
            commands: project.spec.commands,
            exists: project.directory_exists,
        })
        .collect()
}

/// Deploy a single project
pub async fn deploy_handler(
    State(state): State<Arc<ServerState>>,
    Path(project): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let webhook_data = parse_webhook_body(&body);
    info!(project = %project, "Webhook received for project");
    debug!(payload = %webhook_data, "Webhook payload");

    let outcome = state.sequencer.deploy_project(&project).await;
    let timestamp = Utc::now();

    let Some(reason) = &outcome.failure else {
        return Ok(Json(DeployResponse {
            success: true,
            message: format!("Deployment succeeded for {}", project),
            project,
            timestamp,
            result: OutcomeBody::from(&outcome),
        }));
    };

    let mut body = ErrorResponse::new(String::new());
    body.project = Some(project.clone());
    body.timestamp = Some(timestamp);

    Err(match reason {
        FailureReason::ConfigurationNotFound => {
            body.message = format!("Project {} not found in configuration", project);
            body.available_projects = Some(project_summaries(&state).await);
            ApiError::not_found(body)
        }
        FailureReason::WorkingDirectoryNotFound(path) => {
            body.message = format!("Path {} not found", path.display());
            ApiError::not_found(body)
        }
        FailureReason::AlreadyInFlight => {
            body.message = format!("Deployment already in progress for {}", project);
            ApiError::conflict(body)
        }
        reason => {
            body.message = format!("Deployment failed for {}", project);
            body.error = Some(reason.to_string());
            body.result = Some(OutcomeBody::from(&outcome));
            ApiError::deployment_failed(body)
        }
    })
}

/// Deploy the default chain
pub async fn deploy_default_chain_handler(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    run_chain(&state, None, parse_webhook_body(&body)).await
}

/// Deploy a named chain
pub async fn deploy_chain_handler(
    State(state): State<Arc<ServerState>>,
    Path(chain): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    run_chain(&state, Some(&chain), parse_webhook_body(&body)).await
}

async fn run_chain(
    state: &ServerState,
    chain: Option<&str>,
    webhook_data: Value,
) -> Result<Json<ChainDeployResponse>, ApiError> {
    let key = chain_key(chain);
    info!(chain = %key, "Webhook received for deployment chain");
    debug!(payload = %webhook_data, "Webhook payload");

    match state.sequencer.run_chain(&key).await {
        Ok(report) => {
            let verdict = if report.all_succeeded {
                "succeeded"
            } else {
                "failed"
            };
            Ok(Json(ChainDeployResponse {
                success: report.all_succeeded,
                message: format!(
                    "Deployment chain {}: {}/{} projects succeeded",
                    verdict,
                    report.success_count(),
                    report.outcomes.len()
                ),
                run_id: report.run_id.to_string(),
                chain: report.members.clone(),
                results: report.outcomes.iter().map(OutcomeBody::from).collect(),
                timestamp: report.generated_at,
                webhook_data,
            }))
        }
        Err(err @ HookError::ChainNotFound(_)) => {
            let mut body = ErrorResponse::new(err.to_string());
            body.chain = Some(Vec::new());
            body.timestamp = Some(Utc::now());
            body.error = Some(err.to_string());
            body.webhook_data = Some(webhook_data);
            Err(ApiError::not_found(body))
        }
        Err(err) => Err(ApiError::internal(err.to_string(), state.expose_error_details)),
    }
}

/// List configured projects
pub async fn projects_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let projects = project_summaries(&state).await;
    Json(ProjectListResponse {
        success: true,
        count: projects.len(),
        projects,
    })
}

/// List configured chains
pub async fn chains_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let chains: std::collections::BTreeMap<String, ChainSummary> = list_chains(state.resolver())
        .into_iter()
        .map(|(name, chain)| {
            let summary = ChainSummary {
                name: name.clone(),
                env_var: chain.key,
                count: chain.members.len(),
                projects: chain.members,
            };
            (name, summary)
        })
        .collect();

    Json(ChainListResponse {
        success: true,
        count: chains.len(),
        chains,
    })
}

/// Resolve a project's configuration without running anything
pub async fn dry_run_handler(
    State(state): State<Arc<ServerState>>,
    Path(project): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(spec) = state.resolver().resolve_project(&project) else {
        return Err(ApiError::not_found(ErrorResponse::new(format!(
            "Project {} not found in configuration",
            project
        ))));
    };

    let path_exists = directory_exists(&spec.working_directory).await;

    Ok(Json(DryRunResponse {
        success: true,
        message: format!("Configuration found for {}", project),
        project,
        config: DryRunConfig {
            path: spec.working_directory.display().to_string(),
            commands: spec.commands,
            path_exists,
        },
    }))
}

/// Health check handler
pub async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: Utc::now(),
        uptime: state.started_at.elapsed().as_secs_f64(),
        port: state.port,
        projects: project_count(state.resolver()),
        version: version_info().version,
    })
}

/// Unknown route
pub async fn not_found_handler() -> impl IntoResponse {
    let mut body = ErrorResponse::new("Endpoint not found");
    body.available_endpoints = Some(ENDPOINTS.iter().map(|e| e.to_string()).collect());
    (StatusCode::NOT_FOUND, Json(body))
}
