//! Error types for GBXRemote client operations.
//!
//! Failures fall into two groups. A [`ClientError::Fault`] is an
//! application-level answer delivered to the one caller that made the
//! request. Everything the receive loop cannot recover from ends the
//! connection and reaches every waiting caller as [`ClientError::Closed`].

use std::io;

use thiserror::Error;

use crate::{
    frame::{EofError, FrameError},
    handler_id::HandlerId,
    marshal::{Fault, MarshalError},
};

/// Protocol violations detected by the client.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The server did not greet with `GBXRemote 2`.
    #[error("unsupported or non-GBXRemote server")]
    UnsupportedServer {
        /// The header text actually received, lossily decoded.
        header: String,
    },
    /// The handshake announced an implausibly long header.
    #[error("handshake header length {length} exceeds {max} bytes")]
    HeaderTooLong {
        /// Announced header length.
        length: u32,
        /// Largest accepted header length.
        max: usize,
    },
    /// A frame exceeded the configured payload limit.
    #[error("frame payload of {size} bytes exceeds limit of {max}")]
    FrameTooLarge {
        /// Announced or attempted payload size.
        size: usize,
        /// Configured limit.
        max: usize,
    },
}

/// Why a connection stopped accepting requests.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CloseReason {
    /// [`close`](crate::GbxRemoteClient::close) was called.
    #[error("closed by client")]
    ClosedByClient,
    /// The server closed the socket at a frame boundary.
    #[error("closed by server")]
    ClosedByPeer,
    /// Reading from the socket failed.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The server broke the framing or payload rules.
    #[error("protocol violation: {0}")]
    Protocol(String),
    /// A reply arrived for a handler id with no pending request.
    #[error("reply for unexpected handler {0}")]
    UnexpectedHandler(HandlerId),
}

impl From<FrameError> for CloseReason {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Io(e) => Self::Transport(e.to_string()),
            FrameError::Eof(eof) => Self::Transport(eof.to_string()),
            oversized @ FrameError::Oversized { .. } => Self::Protocol(oversized.to_string()),
        }
    }
}

/// Errors emitted by [`GbxRemoteClient`](crate::GbxRemoteClient).
#[derive(Debug, Error)]
pub enum ClientError {
    /// Socket-level failure while connecting or writing.
    #[error("connection error: {0}")]
    Connection(#[from] io::Error),
    /// The server violated the protocol.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    /// The server answered this request with a fault.
    #[error("remote {0}")]
    Fault(Fault),
    /// A reply arrived for a handler id with no pending request.
    #[error("reply for unexpected handler {0}")]
    UnexpectedHandler(HandlerId),
    /// A request was issued while another with the same id was pending.
    #[error("handler {0} already has a pending request")]
    DuplicateHandler(HandlerId),
    /// `Authenticate` returned a falsy result.
    #[error("authentication failed")]
    Authentication,
    /// The connection ended before a reply arrived.
    #[error("connection closed: {0}")]
    Closed(CloseReason),
    /// The request could not be encoded.
    #[error("failed to marshal request: {0}")]
    Marshal(#[from] MarshalError),
    /// The server did not complete the handshake in time.
    #[error("handshake timed out")]
    HandshakeTimeout,
}

impl ClientError {
    /// Return the remote fault, if this error carries one.
    #[must_use]
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Fault(fault) => Some(fault),
            _ => None,
        }
    }

    /// Whether the error ended the connection rather than a single call.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Protocol(_) | Self::Closed(_) | Self::UnexpectedHandler(_)
        )
    }
}

impl From<FrameError> for ClientError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Io(e) => Self::Connection(e),
            FrameError::Eof(eof @ (EofError::MidHeader { .. } | EofError::MidFrame { .. })) => {
                Self::Connection(io::Error::new(io::ErrorKind::UnexpectedEof, eof))
            }
            FrameError::Oversized { size, max } => {
                Self::Protocol(ProtocolError::FrameTooLarge { size, max })
            }
        }
    }
}
