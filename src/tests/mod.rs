//! Integration tests for leasemesh.
//!
//! Every case starts real servers (store, nodes, gateway) on ephemeral ports
//! and drives them over HTTP.

mod cases_gateway_test;
mod cases_store_api_test;

pub mod support;
