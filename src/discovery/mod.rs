// Package discovery provides store-based instance lookup and request forwarding.

pub mod forward;
pub mod gateway;


pub use forward::{ForwardError, Forwarder, HttpForwarder, Relayed};
pub use gateway::{Gateway, RouteError};
