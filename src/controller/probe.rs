// Package api provides liveness probe controller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;

use crate::http::Controller;
use crate::liveness;

pub const LIVENESS_PATH: &str = "/healthz";

const SUCCESS_RESPONSE: &str = r#"{
  "status": 200,
  "message": "I'm fine :D"
}"#;

const FAILED_RESPONSE: &str = r#"{
  "status": 503,
  "message": "I'm tired :("
}"#;

/// LivenessProbeController answers liveness checks from the probe.
#[derive(Clone)]
pub struct LivenessProbeController {
    probe: Arc<liveness::Probe>,
}

impl LivenessProbeController {
    /// Creates a new liveness probe controller.
    pub fn new(probe: Arc<liveness::Probe>) -> Self {
        Self { probe }
    }

    /// Handles the probe request.
    fn probe(&self) -> Response {
        let headers = [("content-type", "application/json")];
        if self.probe.is_alive() {
            (StatusCode::OK, headers, SUCCESS_RESPONSE).into_response()
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, headers, FAILED_RESPONSE).into_response()
        }
    }
}

impl Controller for LivenessProbeController {
    fn add_route(&self, router: Router) -> Router {
        let controller = self.clone();
        router.route(
            LIVENESS_PATH,
            get(move || {
                let controller = controller.clone();
                async move { controller.probe() }
            }),
        )
    }
}
