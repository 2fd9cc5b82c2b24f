// Package api provides the compute node's multiply endpoint.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::admission::AdmissionGate;
use crate::compute::Multiplier;
use crate::http::Controller;
use crate::metrics;

pub const MULTIPLY_PATH: &str = "/multiply/:n";
pub const MULTIPLY_ROOT_PATH: &str = "/multiply/";

pub const AT_CAPACITY_RESPONSE: &str = "Service at capacity\n";
pub const INVALID_NUMBER_RESPONSE: &str = "Invalid number\n";
pub const OVERFLOW_RESPONSE: &str = "Result out of range\n";

/// MultiplyController serves `GET /multiply/{n}` behind the admission gate.
#[derive(Clone)]
pub struct MultiplyController {
    gate: Arc<AdmissionGate>,
    multiplier: Arc<Multiplier>,
}

impl MultiplyController {
    pub fn new(gate: Arc<AdmissionGate>, multiplier: Arc<Multiplier>) -> Self {
        Self { gate, multiplier }
    }

    async fn multiply(State(controller): State<Arc<Self>>, raw: String) -> Response {
        // Bad input never takes a slot.
        let n = match raw.parse::<i64>() {
            Ok(n) => n,
            Err(e) => {
                debug!(
                    component = "compute",
                    event = "invalid_number",
                    input = %raw,
                    error = %e,
                    "rejected non-integer input"
                );
                return (StatusCode::BAD_REQUEST, INVALID_NUMBER_RESPONSE).into_response();
            }
        };

        let permit = match controller.gate.try_acquire() {
            Ok(permit) => permit,
            Err(_) => {
                metrics::admission_rejected();
                warn!(
                    component = "admission",
                    event = "rejected",
                    capacity = ?controller.gate.capacity(),
                    "no resource slots available, service at capacity"
                );
                return (StatusCode::SERVICE_UNAVAILABLE, AT_CAPACITY_RESPONSE).into_response();
            }
        };
        metrics::admission_granted(controller.gate.in_flight());
        debug!(
            component = "admission",
            event = "acquired",
            in_flight = controller.gate.in_flight(),
            "resource slot acquired, processing"
        );

        let result = controller.multiplier.run(n).await;

        permit.release();
        metrics::admission_released(controller.gate.in_flight());
        debug!(
            component = "admission",
            event = "released",
            in_flight = controller.gate.in_flight(),
            "resource slot freed"
        );

        match result {
            Ok(result) => {
                info!(
                    component = "compute",
                    event = "multiplied",
                    n = n,
                    result = result,
                    "returning the result"
                );
                (StatusCode::OK, Json(serde_json::json!({ "result": result }))).into_response()
            }
            Err(e) => {
                warn!(
                    component = "compute",
                    event = "overflow",
                    error = %e,
                    "result does not fit"
                );
                (StatusCode::BAD_REQUEST, OVERFLOW_RESPONSE).into_response()
            }
        }
    }
}

impl Controller for MultiplyController {
    fn add_route(&self, router: Router) -> Router {
        let controller = Arc::new(self.clone());
        let root = controller.clone();
        router
            .route(
                MULTIPLY_PATH,
                get(move |Path(raw): Path<String>| {
                    let controller = controller.clone();
                    async move { Self::multiply(State(controller), raw).await }
                }),
            )
            // An empty n is still a request for this endpoint.
            .route(
                MULTIPLY_ROOT_PATH,
                get(move || {
                    let controller = root.clone();
                    async move { Self::multiply(State(controller), String::new()).await }
                }),
            )
    }
}
