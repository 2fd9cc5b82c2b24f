// Package admission provides the fail-fast concurrency gate of the compute node.

pub mod gate;


pub use gate::{AdmissionGate, AdmissionRejected, Permit};
