//! # factlens-api
//!
//! HTTP surface for factlens: submit a video URL for fact-checking and poll
//! the resulting job.
//!
//! | Route | Description |
//! |-------|-------------|
//! | `POST /api/analyze` | Submit `{url, user_id?}`, returns `{job_id, status}` |
//! | `GET /api/status/:job_id` | Job state, result or error |
//! | `GET /api/health` | Liveness probe |
//! | `GET /` | Welcome message |

mod error;
mod handlers;

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use factlens_core::defaults::CORS_MAX_AGE_SECS;
use factlens_jobs::PipelineRunner;

pub use error::{ApiError, CAPACITY_MESSAGE};
pub use handlers::StatusResponse;

/// Largest accepted request body. Submissions are a URL and a user id.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub runner: PipelineRunner,
}

impl AppState {
    pub fn new(runner: PipelineRunner) -> Self {
        Self { runner }
    }
}

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// CORS
// =============================================================================

/// Parse a comma-separated origin list, skipping entries that are not valid
/// header values.
fn parse_allowed_origins(raw: &str) -> Vec<HeaderValue> {
    raw.split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}

/// CORS policy for the given origin list.
///
/// `None` (or a list with no usable origins) allows any origin, which is
/// what the browser extension and mobile clients need.
pub fn cors_layer(allowed_origins: Option<&str>) -> CorsLayer {
    let origins = allowed_origins.map(parse_allowed_origins).unwrap_or_default();
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(CORS_MAX_AGE_SECS))
}

/// CORS policy from `CORS_ALLOWED_ORIGINS`.
pub fn cors_layer_from_env() -> CorsLayer {
    let raw = std::env::var("CORS_ALLOWED_ORIGINS").ok();
    cors_layer(raw.as_deref())
}

// =============================================================================
// ROUTER
// =============================================================================

/// Build the API router.
pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/api/health", get(handlers::health_check))
        .route("/api/analyze", post(handlers::analyze))
        .route("/api/status/:job_id", get(handlers::job_status))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(CatchPanicLayer::new())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}
