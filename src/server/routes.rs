//! Router configuration for the compression GUI.
//!
//! # Route Structure
//!
//! ```text
//! /                 - GUI page
//! /health           - Health check
//! /api/browse       - Directory listing
//! /api/compress     - Compress, verify and retain (POST)
//! /api/progress     - Progress of the running operation
//! /api/verify       - Verify a pair of files (POST)
//! /api/diff         - Verification plot (PNG)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tiff_squeeze::server::{create_router, AppState, RouterConfig};
//!
//! let router = create_router(AppState::new("/data"), RouterConfig::new());
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8640").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    browse_handler, compress_handler, diff_handler, health_handler, index_handler,
    progress_handler, verify_handler, AppState,
};

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = same-origin only)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Same-origin only, with tracing enabled.
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            enable_tracing: true,
        }
    }

    /// Set specific allowed CORS origins. `"*"` allows any origin.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the application router.
pub fn create_router(state: AppState, config: RouterConfig) -> Router {
    let api = Router::new()
        .route("/browse", get(browse_handler))
        .route("/compress", post(compress_handler))
        .route("/progress", get(progress_handler))
        .route("/verify", post(verify_handler))
        .route("/diff", get(diff_handler));

    let router = Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .nest("/api", api)
        .with_state(state);

    let router = match build_cors_layer(&config) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer, if any origins are configured.
fn build_cors_layer(config: &RouterConfig) -> Option<CorsLayer> {
    let origins = config.cors_origins.as_ref().filter(|o| !o.is_empty())?;

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    if origins.iter().any(|o| o == "*") {
        return Some(cors.allow_origin(Any));
    }
    let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    Some(cors.allow_origin(parsed))
}
