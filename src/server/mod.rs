//! Local web GUI for compression and verification.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │      GET /   /api/browse   POST /api/compress   /api/diff       │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │  handlers   │  │     ui      │  │        routes           │  │
//! │  │ (requests)  │  │ (HTML page) │  │  (router config)        │  │
//! │  └──────┬──────┘  └─────────────┘  └─────────────────────────┘  │
//! └─────────┼───────────────────────────────────────────────────────┘
//!           │ spawn_blocking, one job at a time
//!           ▼
//!   FileManager / TiffVerifier
//! ```

pub mod handlers;
pub mod routes;
mod ui;

pub use handlers::{
    browse_handler, compress_handler, diff_handler, health_handler, index_handler,
    progress_handler, verify_handler, ApiError, AppState, BrowseEntry, BrowseQuery,
    BrowseResponse, CompressRequest, DiffQuery, ErrorResponse, HealthResponse, ProgressState,
    VerifyRequest, VerifyResponse,
};
pub use routes::{create_router, RouterConfig};
