//! Builder for configuring and connecting a GBXRemote client.

use std::{sync::Arc, time::Duration};

use crate::{
    client::{SocketOptions, TracingConfig},
    frame::DEFAULT_PAYLOAD_LIMIT,
    handler_id::HandlerId,
    marshal::{Marshaler, XmlRpcMarshaler},
};

mod connect;

/// Default GBXRemote port of a dedicated server.
pub const DEFAULT_PORT: u16 = 5000;

/// Builder for [`GbxRemoteClient`](crate::GbxRemoteClient).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use gbxremote::client::GbxRemoteClientBuilder;
///
/// let builder = GbxRemoteClientBuilder::new()
///     .handshake_timeout(Duration::from_secs(5))
///     .max_payload(1024 * 1024)
///     .nodelay(true);
/// let _ = builder;
/// ```
pub struct GbxRemoteClientBuilder {
    pub(crate) marshaler: Arc<dyn Marshaler>,
    pub(crate) max_payload: usize,
    pub(crate) handshake_timeout: Option<Duration>,
    pub(crate) socket_options: SocketOptions,
    pub(crate) tracing_config: TracingConfig,
    pub(crate) first_handler: HandlerId,
}

impl GbxRemoteClientBuilder {
    /// Create a builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            marshaler: Arc::new(XmlRpcMarshaler),
            max_payload: DEFAULT_PAYLOAD_LIMIT,
            handshake_timeout: None,
            socket_options: SocketOptions::default(),
            tracing_config: TracingConfig::default(),
            first_handler: HandlerId::FIRST_REQUEST,
        }
    }

    /// Replace the payload marshaler.
    #[must_use]
    pub fn marshaler(mut self, marshaler: Arc<dyn Marshaler>) -> Self {
        self.marshaler = marshaler;
        self
    }

    /// Set the largest payload accepted in either direction.
    ///
    /// The value is clamped to
    /// [`MIN_PAYLOAD_LIMIT`](crate::frame::MIN_PAYLOAD_LIMIT)`..=`
    /// [`MAX_PAYLOAD_LIMIT`](crate::frame::MAX_PAYLOAD_LIMIT).
    #[must_use]
    pub fn max_payload(mut self, bytes: usize) -> Self {
        self.max_payload = bytes;
        self
    }

    /// Fail the connection if the greeting does not arrive within `limit`.
    #[must_use]
    pub fn handshake_timeout(mut self, limit: Duration) -> Self {
        self.handshake_timeout = Some(limit);
        self
    }

    /// Replace the socket options applied before connecting.
    #[must_use]
    pub fn socket_options(mut self, socket_options: SocketOptions) -> Self {
        self.socket_options = socket_options;
        self
    }

    /// Configure `TCP_NODELAY` for the connection.
    #[must_use]
    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.socket_options = self.socket_options.nodelay(enabled);
        self
    }

    /// Configure `SO_KEEPALIVE` for the connection.
    #[must_use]
    pub fn keepalive(mut self, duration: Option<Duration>) -> Self {
        self.socket_options = self.socket_options.keepalive(duration);
        self
    }

    /// Configure tracing spans and timing for client operations.
    #[must_use]
    pub fn tracing_config(mut self, config: TracingConfig) -> Self {
        self.tracing_config = config;
        self
    }

    /// Set the handler id of the first request.
    ///
    /// Ids below `0x8000_0000` are raised to
    /// [`HandlerId::FIRST_REQUEST`]. Mostly useful to exercise wraparound.
    #[must_use]
    pub fn first_handler(mut self, id: HandlerId) -> Self {
        self.first_handler = id;
        self
    }
}

impl Default for GbxRemoteClientBuilder {
    fn default() -> Self { Self::new() }
}
