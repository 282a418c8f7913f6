//! Prometheus metrics for the bridge kernel host, exposed on `/metrics`
//! for scraping — same `lazy_static` + `register_*!` pattern as the
//! teacher's relayer metrics.

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_gauge, register_int_gauge, CounterVec, Gauge, IntGauge};

lazy_static! {
    pub static ref CAUSES_PROCESSED: CounterVec = register_counter_vec!(
        "bridge_kernel_causes_processed_total",
        "Total number of causes dispatched, by cause name and outcome",
        &["cause", "outcome"]
    )
    .unwrap();

    pub static ref STOPS_TOTAL: Gauge = register_gauge!(
        "bridge_kernel_stopped",
        "1 if the kernel is currently stopped, 0 otherwise"
    )
    .unwrap();

    pub static ref NEXT_NONCE: IntGauge = register_int_gauge!(
        "bridge_kernel_next_nonce",
        "Current next_nonce value"
    )
    .unwrap();

    pub static ref NOCK_HEIGHT: IntGauge = register_int_gauge!(
        "bridge_kernel_nock_next_height",
        "Current nock_next_height value"
    )
    .unwrap();

    pub static ref BASE_HEIGHT: IntGauge = register_int_gauge!(
        "bridge_kernel_base_next_height",
        "Current base_next_height value"
    )
    .unwrap();
}

/// Refresh the gauges from a freshly-dispatched state snapshot.
pub fn observe(state: &bridge_kernel::BridgeState) {
    STOPS_TOTAL.set(if state.stop.is_some() { 1.0 } else { 0.0 });
    NEXT_NONCE.set(state.next_nonce as i64);
    NOCK_HEIGHT.set(state.hash_state.nock_next_height as i64);
    BASE_HEIGHT.set(state.hash_state.base_next_height as i64);
}
