// Package api provides the discovery gateway's forwarding endpoint.

use axum::{
    body::Body,
    http::Uri,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;

use crate::discovery::Gateway;
use crate::http::Controller;

pub const GATEWAY_PATH: &str = "/multiply/*rest";
pub const GATEWAY_ROOT_PATH: &str = "/multiply/";

/// GatewayController forwards `GET /multiply/...` to a discovered instance and
/// relays its status and body.
#[derive(Clone)]
pub struct GatewayController {
    gateway: Arc<Gateway>,
}

impl GatewayController {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    async fn forward(&self, uri: Uri) -> Response {
        match self.gateway.route(uri.path()).await {
            Ok(relayed) => {
                let mut response = Response::new(Body::from(relayed.body));
                *response.status_mut() = relayed.status;
                response
            }
            Err(e) => (e.status(), format!("{}\n", e.public_message())).into_response(),
        }
    }
}

impl Controller for GatewayController {
    fn add_route(&self, router: Router) -> Router {
        let controller = self.clone();
        let forward = get(move |uri: Uri| {
            let controller = controller.clone();
            async move { controller.forward(uri).await }
        });
        router
            .route(GATEWAY_PATH, forward.clone())
            .route(GATEWAY_ROOT_PATH, forward)
    }
}
