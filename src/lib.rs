#![doc(html_root_url = "https://docs.rs/gbxremote/latest")]
//! Asynchronous client for the GBXRemote 2 protocol.
//!
//! Dedicated game servers expose a length-prefixed XML-RPC control channel.
//! This crate provides the transport core (handshake, framing, request
//! correlation and notification fan-out over one shared socket) plus an
//! XML-RPC marshaler and TrackMania conveniences on top.

pub mod byte_order;
pub mod client;
pub mod dispatcher;
pub mod frame;
pub mod handler_id;
pub mod handshake;
pub mod marshal;
pub mod metrics;
pub mod panic;
pub mod pending;
pub mod trackmania;
pub mod value;

pub use client::{
    ClientError,
    CloseReason,
    ConnectionState,
    GbxRemoteClient,
    GbxRemoteClientBuilder,
    ProtocolError,
};
pub use dispatcher::{Interest, ListenerId, Notification};
pub use handler_id::{HandlerId, HandlerIdAllocator};
pub use marshal::{Fault, Marshaler, XmlRpcMarshaler};
pub use trackmania::Callback;
pub use value::Value;
