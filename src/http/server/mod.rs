// Package server provides the axum HTTP server.

#[allow(clippy::module_inception)]
pub mod server;

pub use server::HttpServer;
