//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::config::store::ConfigStore;
use crate::deploy::discovery::project_count;
use crate::deploy::executor::ProcessExecutor;
use crate::deploy::resolver::{Resolver, DEFAULT_CHAIN_KEY};
use crate::deploy::sequencer::ChainSequencer;
use crate::errors::HookError;
use crate::server::handlers::ENDPOINTS;
use crate::server::serve::serve;
use crate::server::state::ServerState;

/// Run the webhook server until the shutdown signal fires
pub async fn run(
    options: AppOptions,
    store: Arc<dyn ConfigStore>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), HookError> {
    info!("Initializing deployhook...");

    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    let state = Arc::new(init_state(&options, store));
    log_startup(&state);

    let mut server_rx = shutdown_tx.subscribe();
    let server_handle = serve(&options.server, state, async move {
        let _ = server_rx.recv().await;
    })
    .await?;
    shutdown_manager.with_socket_server_handle(server_handle)?;

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

/// Wire the deployment engine from the application options
pub fn init_state(options: &AppOptions, store: Arc<dyn ConfigStore>) -> ServerState {
    let executor = Arc::new(ProcessExecutor::new(options.executor()));
    let sequencer = ChainSequencer::from_settings(Resolver::new(store), executor, &options.settings);

    ServerState::new(
        Arc::new(sequencer),
        options.server.port,
        options.settings.expose_error_details,
    )
}

fn log_startup(state: &ServerState) {
    let resolver = state.resolver();
    info!(
        port = state.port,
        projects = project_count(resolver),
        policy = ?state.sequencer.policy(),
        "Webhook deployment server configured"
    );

    if let Some(chain) = resolver.resolve_chain_exact(DEFAULT_CHAIN_KEY) {
        info!("Default deployment chain: {}", chain.join(" -> "));
    }
    for endpoint in ENDPOINTS {
        info!("Endpoint: {}", endpoint);
    }
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    socket_server_handle: Option<JoinHandle<Result<(), HookError>>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            socket_server_handle: None,
        }
    }

    pub fn with_socket_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), HookError>>,
    ) -> Result<(), HookError> {
        if self.socket_server_handle.is_some() {
            return Err(HookError::ShutdownError("server_handle already set".to_string()));
        }
        self.socket_server_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), HookError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, abandoning in-flight requests",
                    self.lifecycle_options.max_shutdown_delay
                );
                Err(HookError::ShutdownError("shutdown timed out".to_string()))
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), HookError> {
        info!("Shutting down deployhook...");

        if let Some(handle) = self.socket_server_handle.take() {
            handle.await.map_err(|e| HookError::ShutdownError(e.to_string()))??;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
