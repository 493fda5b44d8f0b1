//! Application configuration options

use std::time::Duration;

use crate::config::settings::Settings;
use crate::deploy::executor::ExecutorOptions;

/// Main application options
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Server configuration
    pub server: ServerOptions,

    /// Service settings the deployment engine is built from
    pub settings: Settings,
}

impl AppOptions {
    pub fn from_settings(settings: Settings) -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            server: ServerOptions {
                host: settings.host.clone(),
                port: settings.port,
            },
            settings,
        }
    }

    pub fn executor(&self) -> ExecutorOptions {
        ExecutorOptions::from(&self.settings)
    }
}

/// Lifecycle options for the service
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        let settings = Settings::default();
        Self {
            host: settings.host,
            port: settings.port,
        }
    }
}
