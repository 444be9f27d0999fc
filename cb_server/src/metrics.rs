//! Prometheus metrics for monitoring booking activity.
//!
//! Metrics are exposed in Prometheus text format for scraping by monitoring systems.
//!
//! # Metrics Categories
//!
//! - **Booking Metrics**: Lifecycle events by kind
//! - **Reclaimer Metrics**: Sweeps, expired holds and failures
//! - **Refund Metrics**: Pending reviews and issued refunds
//! - **Database Metrics**: Connection pool status

use cabin_booking::collaborators::BookingNotifier;
use cabin_booking::events::BookingEvent;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// Booking Metrics
// ============================================================================

/// Increment the lifecycle event counter.
pub fn booking_events_total(event: &'static str) {
    metrics::counter!("booking_events_total", "event" => event).increment(1);
}

// ============================================================================
// Reclaimer Metrics
// ============================================================================

/// Record one finished sweep.
pub fn hold_sweep(expired: usize, failed: usize) {
    metrics::counter!("hold_sweeps_total").increment(1);
    metrics::counter!("holds_expired_total").increment(expired as u64);
    metrics::counter!("hold_expiry_failures_total").increment(failed as u64);
}

// ============================================================================
// Refund Metrics
// ============================================================================

/// Record refund amount in minor units.
pub fn refund_amount(kind: &'static str, amount: i64) {
    metrics::histogram!("refund_amount_minor_units", "kind" => kind).record(amount as f64);
}

// ============================================================================
// Database Metrics
// ============================================================================

/// Set current database connection pool size.
pub fn db_connections_active(count: u32) {
    metrics::gauge!("db_connections_active").set(count as f64);
}

/// Turns booking events into metric updates
#[derive(Debug, Clone, Default)]
pub struct MetricsNotifier;

impl BookingNotifier for MetricsNotifier {
    fn publish(&self, event: BookingEvent) {
        booking_events_total(event.name());

        match event {
            BookingEvent::HoldSweepCompleted {
                expired, failed, ..
            } => hold_sweep(expired, failed),
            BookingEvent::RefundPending { amount, .. } => refund_amount("pending", amount.amount),
            BookingEvent::RefundIssued { amount, .. } => refund_amount("issued", amount.amount),
            _ => {}
        }
    }
}
