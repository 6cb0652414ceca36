//! Client runtime for GBXRemote connections.
//!
//! A [`GbxRemoteClient`] owns one TCP connection. After the `GBXRemote 2`
//! greeting is validated a background receive loop takes over every read,
//! completing pending requests by handler id and fanning notifications out
//! to registered listeners. Writes are serialised by an async mutex so
//! frames from concurrent callers never interleave.

mod builder;
mod config;
mod error;
mod receive_loop;
mod runtime;
mod tracing_config;
mod tracing_helpers;

pub use builder::{DEFAULT_PORT, GbxRemoteClientBuilder};
pub use config::SocketOptions;
pub use error::{ClientError, CloseReason, ProtocolError};
pub use runtime::{ConnectionState, GbxRemoteClient};
pub use tracing_config::TracingConfig;

#[cfg(test)]
mod tests;
