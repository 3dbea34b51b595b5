//! CORS middleware configuration
//!
//! The UI is served from a different origin during development, so every
//! origin is allowed.

use tower_http::cors::CorsLayer;

/// Create the CORS layer
pub fn cors_layer() -> CorsLayer {
    CorsLayer::permissive()
}
