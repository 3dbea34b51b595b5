//! API route definitions

use axum::{
    routing::get,
    Router,
};

use crate::api::{handlers, middleware};
use crate::queue::TaskQueue;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub queue: TaskQueue,
}

/// Build the complete API router
pub fn create_router(queue: TaskQueue) -> Router {
    let app_state = AppState { queue };

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/tasks",
            get(handlers::list_tasks).post(handlers::create_task),
        )
        .route(
            "/tasks/:id",
            get(handlers::get_task).delete(handlers::cancel_task),
        )
        .fallback(not_found)
        .with_state(app_state)
        .layer(middleware::catch_panic_layer())
        .layer(middleware::logging_layer())
        .layer(middleware::cors_layer())
}

async fn not_found() -> crate::api::ApiError {
    crate::api::ApiError::NotFound("No such route".to_string())
}
