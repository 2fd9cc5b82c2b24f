//! Prometheus metrics functionality.
//
//! Everything goes through the `metrics` facade; without an installed recorder
//! (tests, exporter init failure) the calls are no-ops.

pub const ADMISSION_GRANTED: &str = "leasemesh_admission_granted_total";
pub const ADMISSION_REJECTED: &str = "leasemesh_admission_rejected_total";
pub const ADMISSION_IN_FLIGHT: &str = "leasemesh_admission_in_flight";
pub const LEASE_RENEWALS: &str = "leasemesh_lease_renewals_total";
pub const LEASE_LOST: &str = "leasemesh_lease_lost_total";
pub const GATEWAY_REQUESTS: &str = "leasemesh_gateway_requests_total";
pub const HTTP_PANICS: &str = "leasemesh_http_panics_total";

pub fn admission_granted(in_flight: usize) {
    metrics::counter!(ADMISSION_GRANTED).increment(1);
    metrics::gauge!(ADMISSION_IN_FLIGHT).set(in_flight as f64);
}

pub fn admission_rejected() {
    metrics::counter!(ADMISSION_REJECTED).increment(1);
}

pub fn admission_released(in_flight: usize) {
    metrics::gauge!(ADMISSION_IN_FLIGHT).set(in_flight as f64);
}

pub fn lease_renewed() {
    metrics::counter!(LEASE_RENEWALS).increment(1);
}

pub fn lease_lost() {
    metrics::counter!(LEASE_LOST).increment(1);
}

/// Counts one routed request by outcome (`forwarded`, `unavailable`, `error`).
pub fn gateway_request(outcome: &'static str) {
    metrics::counter!(GATEWAY_REQUESTS, "outcome" => outcome).increment(1);
}

pub fn panic_recovered() {
    metrics::counter!(HTTP_PANICS).increment(1);
}
