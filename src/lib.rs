#[cfg(test)]
mod tests;

pub mod admission;
pub mod app;
pub mod compute;
pub mod config;
pub mod controller;
pub mod discovery;
pub mod http;
pub mod liveness;
pub mod metrics;
pub mod middleware;
pub mod model;
pub mod registry;
pub mod shutdown;
pub mod store;
