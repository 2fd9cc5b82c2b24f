// Package middleware provides router-wide HTTP layers.

pub mod middleware;
pub mod recover_middleware;
pub mod trace_middleware;

pub use recover_middleware::PanicRecoverMiddleware;
pub use trace_middleware::TraceMiddleware;
