//! HTTP API server for parley

pub mod conversation;
mod error;
pub mod health;
pub mod voice;

pub use error::ApiError;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::turn::TurnCoordinator;

/// Largest accepted audio upload
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub coordinator: Arc<TurnCoordinator>,
}

/// HTTP front end for a [`TurnCoordinator`]
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServer {
    #[must_use]
    pub fn new(coordinator: Arc<TurnCoordinator>, port: u16) -> Self {
        Self {
            state: Arc::new(ApiState { coordinator }),
            port,
            static_dir: None,
        }
    }

    /// Serve a demo page from this directory at `/`
    #[must_use]
    pub fn static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .merge(conversation::router(self.state.clone()))
            .merge(voice::router(self.state.clone()))
            .merge(health::router(self.state.clone()));

        // Serve static files if configured
        if let Some(static_dir) = &self.static_dir {
            let index_file = static_dir.join("index.html");
            let serve_dir = ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_file));

            router = router.fallback_service(serve_dir);
            tracing::info!(path = %static_dir.display(), "serving static files");
        }

        // Any origin may call the API, matching a locally hosted demo page
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router
            .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the API server until Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .inspect_err(|e| tracing::error!(%addr, error = %e, "failed to bind API server"))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!(error = %e, "no signal handler, running until killed");
                    std::future::pending::<()>().await;
                }
                tracing::info!("shutting down");
            })
            .await
            .inspect_err(|e| tracing::error!(error = %e, "API server failed"))?;

        Ok(())
    }
}
