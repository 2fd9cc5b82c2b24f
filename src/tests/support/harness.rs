// Integration test harness setup.

use std::sync::OnceLock;

use crate::controller::metrics::init_prometheus_exporter;

static INIT: OnceLock<()> = OnceLock::new();

/// Installs process-wide test fixtures once: the metrics recorder and a test
/// log subscriber (RUST_LOG controls verbosity).
pub fn init_test_harness() {
    INIT.get_or_init(|| {
        if let Err(e) = init_prometheus_exporter() {
            eprintln!("[e2e] metrics recorder not installed: {}", e);
        }
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
