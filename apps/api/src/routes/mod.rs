pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    http::{Method, StatusCode, Uri},
    routing::{get, post},
    Router,
};

use crate::analysis::handlers;
use crate::errors::AppError;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .route("/health", get(health::health_handler))
        // Analysis API
        .route("/api/v1/analysis/tailor", post(handlers::handle_tailor))
        .route("/api/v1/analysis/match", post(handlers::handle_match))
        .route(
            "/api/v1/analysis/skills-gap",
            post(handlers::handle_skills_gap),
        )
        .route(
            "/api/v1/analysis/career-path",
            post(handlers::handle_career_path),
        )
        .route(
            "/api/v1/analysis/:kind/upload",
            post(handlers::handle_upload),
        )
        // Must come after every route: it only applies to routes already added
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(unknown_route)
        .layer(body_limit)
        .with_state(state)
}

async fn unknown_route(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {uri}"))
}

async fn method_not_allowed(method: Method, uri: Uri) -> AppError {
    AppError::Rejected {
        status: StatusCode::METHOD_NOT_ALLOWED,
        message: format!("Method {method} is not allowed on {uri}"),
    }
}
