//! Panic recovery middleware.
//

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::error;

use crate::metrics;

const PANIC_RESPONSE: &str = "Internal Server Error\n";

/// PanicRecoverMiddleware turns a panicking handler into a 500 response.
///
/// The panic unwinds the handler future first, so guards it held (admission
/// permits) are already released when the response is built.
pub struct PanicRecoverMiddleware;

impl PanicRecoverMiddleware {
    /// Creates a new panic recovery middleware.
    pub fn new() -> Self {
        Self
    }
}

impl Default for PanicRecoverMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };

    metrics::panic_recovered();
    error!(
        component = "server",
        event = "panic_recovered",
        panic = detail,
        "handler panicked"
    );

    (StatusCode::INTERNAL_SERVER_ERROR, PANIC_RESPONSE).into_response()
}

// Implementation of Middleware trait
impl crate::middleware::middleware::Middleware for PanicRecoverMiddleware {
    fn apply(&self, router: axum::Router) -> axum::Router {
        router.layer(CatchPanicLayer::custom(handle_panic))
    }
}
