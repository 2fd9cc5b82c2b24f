//! Request tracing middleware.

use tower_http::trace::TraceLayer;

/// TraceMiddleware opens a `tracing` span per HTTP request.
#[derive(Default)]
pub struct TraceMiddleware;

impl TraceMiddleware {
    pub fn new() -> Self {
        Self
    }
}

impl crate::middleware::middleware::Middleware for TraceMiddleware {
    fn apply(&self, router: axum::Router) -> axum::Router {
        router.layer(TraceLayer::new_for_http())
    }
}
