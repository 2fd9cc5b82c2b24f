// HTTP module: server and outbound client.

pub mod client;
pub mod server;

pub use crate::middleware::middleware::Middleware;

pub use server::HttpServer;

// Common controller interface
pub use crate::controller::controller::Controller;
