// Shared test support code for integration tests.

pub mod common;
pub mod harness;
pub mod mesh;

pub use common::*;
pub use harness::init_test_harness;
pub use mesh::TestMesh;
