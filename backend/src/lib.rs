use std::{path::Path, sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::Request,
    response::Response,
    routing::{delete, get, put},
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::Span;

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod store;

use auth::SessionKeys;
use store::TaskStore;

#[derive(Clone)]
pub struct AppState {
    pub store: TaskStore,
    pub keys: Arc<SessionKeys>,
}

impl AppState {
    pub fn new(store: TaskStore, keys: SessionKeys) -> Self {
        Self {
            store,
            keys: Arc::new(keys),
        }
    }
}

/// The task API alone, without static files or HTTP middleware.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/tasks",
            get(handlers::list_tasks)
                .post(handlers::create_task)
                .put(handlers::update_task),
        )
        .route(
            "/api/tasks/:id",
            put(handlers::update_task_by_id).delete(handlers::delete_task),
        )
        .route("/api/:id", delete(handlers::delete_task))
        .route("/health", get(handlers::health))
        .with_state(state)
}

/// The full server: API routes, the frontend bundle from `static_dir`,
/// CORS and request tracing.
pub fn app(state: AppState, static_dir: &Path) -> Router {
    api_router(state)
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .on_request(|request: &Request<Body>, _span: &Span| {
                    tracing::info!("{} {}", request.method(), request.uri().path());
                })
                .on_response(|response: &Response, latency: Duration, _span: &Span| {
                    if response.status().is_server_error() {
                        tracing::error!(status = %response.status(), ?latency, "request failed");
                    } else {
                        tracing::info!(status = %response.status(), ?latency, "request finished");
                    }
                }),
        )
}
