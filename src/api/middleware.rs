//! Cross-origin policy for the upload endpoint.

use axum::http::{header, Method};
use tower_http::cors::{Any, CorsLayer};

/// Any origin may upload with a `Content-Type` header via POST.
///
/// Every `OPTIONS` request is answered here with an empty 200.
pub fn upload_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}
