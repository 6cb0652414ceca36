//! Metric helpers for `gbxremote`.
//!
//! This module defines metric names and small helpers wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. With the `metrics` feature
//! disabled the helpers compile to nothing.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Gauge tracking connections whose receive loop is running.
pub const CONNECTIONS_ACTIVE: &str = "gbxremote_connections_active";
/// Counter of frames read or written, labelled by direction.
pub const FRAMES_TOTAL: &str = "gbxremote_frames_total";
/// Counter of requests written by `execute`.
pub const REQUESTS_TOTAL: &str = "gbxremote_requests_total";
/// Counter of replies that carried a remote fault.
pub const FAULTS_TOTAL: &str = "gbxremote_faults_total";
/// Counter of notifications dispatched to listeners.
pub const NOTIFICATIONS_TOTAL: &str = "gbxremote_notifications_total";
/// Gauge of requests awaiting a reply.
pub const PENDING_REQUESTS: &str = "gbxremote_pending_requests";
/// Counter of listener panics caught during dispatch.
pub const LISTENER_PANICS_TOTAL: &str = "gbxremote_listener_panics_total";

/// Direction of frame processing.
#[derive(Clone, Copy, Debug)]
pub enum Direction {
    /// Frames read from the server.
    Inbound,
    /// Frames written to the server.
    Outbound,
}

impl Direction {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Increment the active connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the active connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a frame for the given direction.
pub fn inc_frames(direction: Direction) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_TOTAL, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record a request written to the server.
pub fn inc_requests() {
    #[cfg(feature = "metrics")]
    counter!(REQUESTS_TOTAL).increment(1);
}

/// Record a fault reply.
pub fn inc_faults() {
    #[cfg(feature = "metrics")]
    counter!(FAULTS_TOTAL).increment(1);
}

/// Record a dispatched notification.
pub fn inc_notifications() {
    #[cfg(feature = "metrics")]
    counter!(NOTIFICATIONS_TOTAL).increment(1);
}

/// Record a listener panic.
pub fn inc_listener_panics() {
    #[cfg(feature = "metrics")]
    counter!(LISTENER_PANICS_TOTAL).increment(1);
}

/// Publish the number of outstanding requests.
#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
pub fn set_pending(count: usize) {
    #[cfg(feature = "metrics")]
    #[expect(
        clippy::cast_precision_loss,
        reason = "pending request counts stay far below 2^52"
    )]
    gauge!(PENDING_REQUESTS).set(count as f64);
}
