//! Webhook API models
//!
//! Field names are camelCase on the wire to stay compatible with existing
//! CI hooks that parse these responses.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of one project deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeBody {
    pub success: bool,
    pub project: String,
    pub stdout: String,
    pub stderr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

/// Single project deploy response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployResponse {
    pub success: bool,
    pub message: String,
    pub project: String,
    pub timestamp: DateTime<Utc>,
    pub result: OutcomeBody,
}

/// Chain deploy response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDeployResponse {
    pub success: bool,
    pub message: String,
    pub run_id: String,
    pub chain: Vec<String>,
    pub results: Vec<OutcomeBody>,
    pub timestamp: DateTime<Utc>,
    pub webhook_data: Value,
}

/// A configured project as reported by discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub name: String,
    pub path: String,
    pub commands: Vec<String>,
    pub exists: bool,
}

/// Project list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectListResponse {
    pub success: bool,
    pub projects: Vec<ProjectSummary>,
    pub count: usize,
}

/// A configured chain as reported by discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSummary {
    pub name: String,
    pub env_var: String,
    pub projects: Vec<String>,
    pub count: usize,
}

/// Chain list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainListResponse {
    pub success: bool,
    pub chains: BTreeMap<String, ChainSummary>,
    pub count: usize,
}

/// Dry-run configuration view
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DryRunConfig {
    pub path: String,
    pub commands: Vec<String>,
    pub path_exists: bool,
}

/// Dry-run response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DryRunResponse {
    pub success: bool,
    pub message: String,
    pub project: String,
    pub config: DryRunConfig,
}

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub uptime: f64,
    pub port: u16,
    pub projects: usize,
    pub version: String,
}

/// Error envelope shared by every failing endpoint
///
/// Only `success` and `message` are always present; the remaining fields are
/// filled in by the endpoint that produced the error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<OutcomeBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_projects: Option<Vec<ProjectSummary>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_endpoints: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_data: Option<Value>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Default::default()
        }
    }
}
