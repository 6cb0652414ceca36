//! Span and timing helpers for client operations.
//!
//! Span creation with a runtime-selected level lives here so the client
//! methods only decide what to record.

use std::time::Instant;

use tracing::{Level, Span};

use super::tracing_config::TracingConfig;

/// Create a tracing span at a dynamically selected level.
///
/// Each arm calls the matching `tracing::<level>_span!` macro so span
/// metadata stays static while the level is chosen at runtime.
macro_rules! dynamic_span {
    ($level:expr, $name:expr $(, $($field:tt)*)?) => {
        match $level {
            Level::ERROR => tracing::error_span!($name $(, $($field)*)?),
            Level::WARN  => tracing::warn_span!($name $(, $($field)*)?),
            Level::INFO  => tracing::info_span!($name $(, $($field)*)?),
            Level::DEBUG => tracing::debug_span!($name $(, $($field)*)?),
            Level::TRACE => tracing::trace_span!($name $(, $($field)*)?),
        }
    };
}

/// Create a span for the `connect` operation.
#[expect(
    clippy::cognitive_complexity,
    reason = "complexity from dynamic_span! macro expansion"
)]
pub(crate) fn connect_span(config: &TracingConfig, peer_addr: &str) -> Span {
    dynamic_span!(
        config.connect_level,
        "client.connect",
        peer.addr = peer_addr
    )
}

/// Create a span for one `execute` call.
///
/// `handler` and `result` are recorded once known.
#[expect(
    clippy::cognitive_complexity,
    reason = "complexity from dynamic_span! macro expansion"
)]
pub(crate) fn execute_span(config: &TracingConfig, method: &str) -> Span {
    dynamic_span!(
        config.execute_level,
        "client.execute",
        method = method,
        handler = tracing::field::Empty,
        result = tracing::field::Empty
    )
}

/// Create a span for the `close` operation.
#[expect(
    clippy::cognitive_complexity,
    reason = "complexity from dynamic_span! macro expansion"
)]
pub(crate) fn close_span(config: &TracingConfig) -> Span {
    dynamic_span!(config.close_level, "client.close")
}

/// Emit an `elapsed_us` event at `DEBUG` if timing was started.
pub(crate) fn emit_timing_event(start: Option<Instant>) {
    if let Some(start) = start {
        let elapsed_us = start.elapsed().as_micros();
        tracing::debug!(elapsed_us = elapsed_us, "operation.timing");
    }
}
