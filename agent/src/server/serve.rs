//! HTTP server setup

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use axum::{
    http::{header, HeaderName, Method},
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{self, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::HookError;
use crate::server::errors::panic_response;
use crate::server::handlers::{
    chains_handler, deploy_chain_handler, deploy_default_chain_handler, deploy_handler,
    dry_run_handler, health_handler, not_found_handler, projects_handler,
};
use crate::server::state::ServerState;

/// Build the webhook router
pub fn router(state: Arc<ServerState>) -> Router {
    let expose = state.expose_error_details;

    let cors_layer = CorsLayer::new()
        .allow_origin(cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ]);

    Router::new()
        // Deployments
        .route("/webhook/deploy/{project}", post(deploy_handler))
        .route("/webhook/deploy-chain", post(deploy_default_chain_handler))
        .route("/webhook/deploy-chain/{chain}", post(deploy_chain_handler))
        // Discovery
        .route("/webhook/projects", get(projects_handler))
        .route("/webhook/chains", get(chains_handler))
        .route("/webhook/test/{project}", post(dry_run_handler))
        // Health
        .route("/health", get(health_handler))
        .fallback(not_found_handler)
        .method_not_allowed_fallback(not_found_handler)
        // State and middleware
        .with_state(state)
        .layer(CatchPanicLayer::custom(
            move |panic: Box<dyn Any + Send + 'static>| panic_response(panic, expose),
        ))
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), HookError>>, HookError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| HookError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| HookError::ServerError(e.to_string()))
    });

    Ok(handle)
}
