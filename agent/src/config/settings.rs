//! Service settings

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::config::store::ConfigStore;
use crate::errors::HookError;
use crate::logs::LogLevel;

pub const DEFAULT_PORT: u16 = 9522;
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Service settings, read once at startup
///
/// Project and chain definitions are not part of this struct; they are
/// looked up from the store on every request.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Log level
    pub log_level: LogLevel,

    /// Emit JSON log lines
    pub log_json: bool,

    /// Directory for rolling log files
    pub log_dir: Option<PathBuf>,

    /// Show internal error details in responses
    pub expose_error_details: bool,

    /// Wall-clock limit for one project deployment
    pub deploy_timeout: Duration,

    /// Combined stdout/stderr capture limit
    pub max_output_bytes: usize,

    /// Shell used to run each command
    pub shell: String,

    /// Run the default chain when a named chain is not configured
    pub chain_fallback: bool,

    /// Keep deploying chain members after a failure
    pub continue_on_error: bool,

    /// Reject a deployment of a project that is already running
    pub exclusive_projects: bool,

    /// Upper bound on concurrently executing deployments
    pub max_concurrent: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            expose_error_details: false,
            deploy_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            shell: "sh".to_string(),
            chain_fallback: false,
            continue_on_error: false,
            exclusive_projects: false,
            max_concurrent: None,
        }
    }
}

impl Settings {
    /// Read settings from a configuration store, falling back to defaults
    pub fn from_store(store: &dyn ConfigStore) -> Result<Self, HookError> {
        let defaults = Settings::default();

        let log_json = match lookup(store, "LOG_FORMAT") {
            Some(format) => match format.to_lowercase().as_str() {
                "json" => true,
                "text" | "pretty" => false,
                other => {
                    return Err(HookError::ConfigError(format!(
                        "LOG_FORMAT must be 'text' or 'json', got '{}'",
                        other
                    )))
                }
            },
            None => defaults.log_json,
        };

        let log_level = match lookup(store, "LOG_LEVEL") {
            Some(level) => level.parse::<LogLevel>().map_err(HookError::ConfigError)?,
            None => defaults.log_level,
        };

        let max_concurrent = match parse::<usize>(store, "DEPLOY_MAX_CONCURRENT")? {
            Some(0) => {
                return Err(HookError::ConfigError(
                    "DEPLOY_MAX_CONCURRENT must be at least 1".to_string(),
                ))
            }
            other => other,
        };

        Ok(Self {
            host: lookup(store, "HOST").unwrap_or(defaults.host),
            port: parse(store, "PORT")?.unwrap_or(defaults.port),
            log_level,
            log_json,
            log_dir: lookup(store, "LOG_DIR").map(PathBuf::from),
            expose_error_details: lookup(store, "APP_ENV")
                .map(|env| env.eq_ignore_ascii_case("development"))
                .unwrap_or(defaults.expose_error_details),
            deploy_timeout: parse(store, "DEPLOY_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.deploy_timeout),
            max_output_bytes: parse(store, "DEPLOY_MAX_OUTPUT_BYTES")?
                .unwrap_or(defaults.max_output_bytes),
            shell: lookup(store, "DEPLOY_SHELL").unwrap_or(defaults.shell),
            chain_fallback: parse_bool(store, "DEPLOY_CHAIN_FALLBACK")?
                .unwrap_or(defaults.chain_fallback),
            continue_on_error: parse_bool(store, "DEPLOY_CONTINUE_ON_ERROR")?
                .unwrap_or(defaults.continue_on_error),
            exclusive_projects: parse_bool(store, "DEPLOY_EXCLUSIVE")?
                .unwrap_or(defaults.exclusive_projects),
            max_concurrent,
        })
    }
}

fn lookup(store: &dyn ConfigStore, key: &str) -> Option<String> {
    store
        .get(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse<T>(store: &dyn ConfigStore, key: &str) -> Result<Option<T>, HookError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(store, key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| HookError::ConfigError(format!("{} = '{}': {}", key, raw, e)))
        })
        .transpose()
}

fn parse_bool(store: &dyn ConfigStore, key: &str) -> Result<Option<bool>, HookError> {
    lookup(store, key)
        .map(|raw| match raw.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(HookError::ConfigError(format!(
                "{} must be a boolean, got '{}'",
                key, raw
            ))),
        })
        .transpose()
}
