//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared application state from config
//! - Wire up middleware (request ID, tracing, timeout, body limit, metrics)
//! - Serve until Ctrl+C, SIGTERM or the shutdown broadcast fires

use std::sync::Arc;
use std::time::Duration;

use axum::{http::HeaderName, middleware, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::config::AppConfig;
use crate::exec::{CommandRunner, HaproxyValidator, PanelRunner, PanelServiceControl};
use crate::haproxy::{FileStore, MutationPipeline};
use crate::http::middleware::track_requests;
use crate::lifecycle::signals::wait_for_signal;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<MutationPipeline>,
    pub runner: Arc<dyn CommandRunner>,
    pub api_key: Arc<str>,
}

impl AppState {
    /// Wire the production collaborators described by `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(PanelRunner::new(
            &config.panel.root,
            Duration::from_secs(config.panel.command_timeout_secs),
        ));
        let pipeline = MutationPipeline::new(
            Arc::new(FileStore::new(&config.haproxy.config_path)),
            Arc::new(HaproxyValidator::new(
                &config.haproxy.binary,
                Duration::from_secs(config.haproxy.validate_timeout_secs),
            )),
            Arc::new(PanelServiceControl::new(runner.clone())),
            config.haproxy.service_name.clone(),
            &config.haproxy.scratch_dir,
        );

        Self {
            pipeline: Arc::new(pipeline),
            runner,
            api_key: Arc::from(config.admin.api_key.as_str()),
        }
    }
}

/// HTTP server for the admin API.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_state(config, AppState::from_config(config))
    }

    /// Build around caller-supplied collaborators.
    pub fn with_state(config: &AppConfig, state: AppState) -> Self {
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        let request_id = HeaderName::from_static(X_REQUEST_ID);

        setup_admin_router(state)
            .layer(middleware::from_fn(track_requests))
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Resolves on an OS signal or a broadcast from [`crate::lifecycle::Shutdown`].
async fn shutdown_signal(mut shutdown: broadcast::Receiver<()>) {
    tokio::select! {
        _ = wait_for_signal() => {}
        _ = shutdown.recv() => {
            tracing::info!("Shutdown requested");
        }
    }
}
