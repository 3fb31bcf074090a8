//! # HTTP API
//!
//! axum router for the submission front-end.
//!
//! | Method | Path      | Purpose                                   |
//! |--------|-----------|-------------------------------------------|
//! | GET    | `/health` | liveness probe                            |
//! | GET    | `/stages` | the six stage identifiers                 |
//! | POST   | `/submit` | multipart upload (`stage` + `file`) → [`sendbox_core::Report`] |

mod handlers;
mod types;

pub use handlers::{ApiError, health_handler, stages_handler, submit_handler};
pub use types::{ErrorResponse, HealthResponse, StagesResponse};

use crate::pipeline::Evaluator;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{Method, header};
use axum::routing::{get, post};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Room for multipart boundaries and the `stage` field on top of the file.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Shared, read-only server state.
#[derive(Clone)]
pub struct AppState {
    pub evaluator: Evaluator,
    pub limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl AppState {
    pub fn new(evaluator: Evaluator) -> Self {
        Self {
            evaluator,
            limiter: None,
        }
    }

    /// Cap accepted submissions per second. Zero leaves the limiter off.
    #[must_use]
    pub fn with_rate_limit(mut self, per_second: u32) -> Self {
        self.limiter = NonZeroU32::new(per_second)
            .map(|n| Arc::new(RateLimiter::direct(Quota::per_second(n))));
        self
    }
}

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state
        .evaluator
        .config()
        .limits
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stages", get(stages_handler))
        .route("/submit", post(submit_handler))
        .layer(DefaultBodyLimit::max(
            usize::try_from(body_limit).unwrap_or(usize::MAX),
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
