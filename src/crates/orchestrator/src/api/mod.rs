//! HTTP task API
//!
//! Endpoints polled by the UI:
//! - `POST /tasks`, `GET /tasks?ownerRef=`
//! - `GET /tasks/:id`, `DELETE /tasks/:id`
//! - `GET /health`

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;

pub use error::{ApiError, ApiErrorResponse, ApiResult};
pub use middleware::cors_layer;
pub use routes::{create_router, AppState};
