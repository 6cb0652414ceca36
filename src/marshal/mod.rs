//! Payload marshaling for GBXRemote frames.
//!
//! Frames carry XML-RPC documents. The [`Marshaler`] trait is the seam
//! between the transport and the payload format: it turns a method name and
//! parameters into bytes, and classifies inbound bytes as a reply, a fault or
//! a server notification. [`XmlRpcMarshaler`] is the implementation used by
//! default.

use std::fmt;

use thiserror::Error;

use crate::value::Value;

mod decode;
mod encode;

/// A structured application-level error returned in place of a reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fault {
    /// Numeric fault code chosen by the server.
    pub code: i64,
    /// Human-readable fault description.
    pub message: String,
}

impl Fault {
    /// Construct a fault from its code and message.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fault {}: {}", self.code, self.message)
    }
}

/// Classification of one inbound payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// A successful reply carrying its single return value.
    Reply(Value),
    /// A reply that reports a remote fault.
    Fault(Fault),
    /// A server-initiated call that is not correlated to any request.
    Notification {
        /// Name of the notification, for example `TrackMania.PlayerChat`.
        method: String,
        /// Arguments in declaration order.
        params: Vec<Value>,
    },
}

/// Errors raised while encoding or decoding a payload.
#[derive(Debug, Error)]
pub enum MarshalError {
    /// The document is not well-formed XML.
    #[error("malformed XML: {0}")]
    Xml(String),
    /// The payload is not valid UTF-8.
    #[error("payload is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),
    /// An element appeared where the XML-RPC grammar expects another.
    #[error("expected {expected}, found {found}")]
    Unexpected {
        /// What the grammar allows at this point.
        expected: &'static str,
        /// What the document contained instead.
        found: String,
    },
    /// A scalar's text could not be parsed as its declared type.
    #[error("invalid <{kind}> value {text:?}")]
    InvalidValue {
        /// The XML-RPC type tag.
        kind: &'static str,
        /// The offending text.
        text: String,
    },
    /// A `methodResponse` carried neither a value nor a fault.
    #[error("method response carries no value")]
    EmptyResponse,
    /// A fault struct lacked a required member.
    #[error("fault is missing {0}")]
    MalformedFault(&'static str),
    /// Requests must name a method.
    #[error("method name must not be empty")]
    EmptyMethodName,
    /// XML-RPC cannot represent NaN or infinities.
    #[error("cannot encode non-finite double {0}")]
    NonFiniteDouble(f64),
}

/// Converts between payload bytes and method calls, replies and
/// notifications.
///
/// The trait is object safe so a client can hold any implementation behind
/// an `Arc<dyn Marshaler>`.
pub trait Marshaler: Send + Sync + 'static {
    /// Encode a method call.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError`] if the call cannot be represented.
    fn encode_call(&self, method: &str, params: &[Value]) -> Result<Vec<u8>, MarshalError>;

    /// Decode and classify an inbound payload.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError`] if the payload is malformed.
    fn decode_payload(&self, payload: &[u8]) -> Result<Payload, MarshalError>;
}

/// XML-RPC marshaler speaking the dialect understood by GBXRemote servers.
///
/// # Examples
///
/// ```
/// use gbxremote::{
///     Value,
///     marshal::{Marshaler, Payload, XmlRpcMarshaler},
/// };
///
/// let marshaler = XmlRpcMarshaler;
/// let reply = marshaler.encode_response(&Value::Bool(true)).expect("encode reply");
/// assert_eq!(
///     marshaler.decode_payload(&reply).expect("decode reply"),
///     Payload::Reply(Value::Bool(true))
/// );
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct XmlRpcMarshaler;

impl XmlRpcMarshaler {
    /// Encode a successful `methodResponse`.
    ///
    /// Servers produce these; the client only needs it for test doubles.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError`] if the value cannot be represented.
    pub fn encode_response(&self, value: &Value) -> Result<Vec<u8>, MarshalError> {
        encode::response(value)
    }

    /// Encode a fault `methodResponse`.
    #[must_use]
    pub fn encode_fault(&self, fault: &Fault) -> Vec<u8> { encode::fault(fault) }
}

impl Marshaler for XmlRpcMarshaler {
    fn encode_call(&self, method: &str, params: &[Value]) -> Result<Vec<u8>, MarshalError> {
        encode::call(method, params)
    }

    fn decode_payload(&self, payload: &[u8]) -> Result<Payload, MarshalError> {
        decode::payload(payload)
    }
}
