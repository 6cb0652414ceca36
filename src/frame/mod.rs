//! Wire framing for GBXRemote connections.
//!
//! After the handshake every message is one frame:
//!
//! ```text
//! +----------------+-------------------+-------------------+
//! | size: u32 (LE) | handler: u32 (LE) | payload (size B)  |
//! +----------------+-------------------+-------------------+
//! ```
//!
//! [`GbxCodec`] implements `tokio_util`'s [`Decoder`] and [`Encoder`] for
//! [`GbxFrame`], so the client can drive reads and writes through
//! `FramedRead` and `FramedWrite`.

use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use crate::{
    byte_order::{read_wire_u32, write_wire_u32},
    handler_id::HandlerId,
};

/// Smallest payload limit a codec accepts.
pub const MIN_PAYLOAD_LIMIT: usize = 64;

/// Largest payload limit a codec accepts (64 MiB).
pub const MAX_PAYLOAD_LIMIT: usize = 64 * 1024 * 1024;

/// Payload limit used when none is configured (4 MiB).
pub const DEFAULT_PAYLOAD_LIMIT: usize = 4 * 1024 * 1024;

/// One length-prefixed unit on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GbxFrame {
    /// Correlation id from the frame header.
    pub handler: HandlerId,
    /// Marshaled payload bytes.
    pub payload: Bytes,
}

impl GbxFrame {
    /// Build a frame from its parts.
    pub fn new(handler: HandlerId, payload: impl Into<Bytes>) -> Self {
        Self {
            handler,
            payload: payload.into(),
        }
    }
}

/// The fixed 8-byte header preceding each payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    /// Payload length in bytes.
    pub size: u32,
    /// Correlation id.
    pub handler: HandlerId,
}

impl FrameHeader {
    /// Encoded header length.
    pub const LEN: usize = 8;

    /// Serialise the header.
    ///
    /// # Examples
    ///
    /// ```
    /// use gbxremote::{HandlerId, frame::FrameHeader};
    ///
    /// let header = FrameHeader {
    ///     size: 5,
    ///     handler: HandlerId::FIRST_REQUEST,
    /// };
    /// assert_eq!(header.to_bytes(), [5, 0, 0, 0, 0, 0, 0, 0x80]);
    /// assert_eq!(FrameHeader::from_bytes(header.to_bytes()), header);
    /// ```
    #[must_use]
    pub fn to_bytes(self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[..4].copy_from_slice(&write_wire_u32(self.size));
        out[4..].copy_from_slice(&write_wire_u32(self.handler.as_u32()));
        out
    }

    /// Parse a header from its wire bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        let [s0, s1, s2, s3, h0, h1, h2, h3] = bytes;
        Self {
            size: read_wire_u32([s0, s1, s2, s3]),
            handler: HandlerId::new(read_wire_u32([h0, h1, h2, h3])),
        }
    }

    fn peek(src: &[u8]) -> Option<Self> {
        let bytes = src.get(..Self::LEN)?;
        <[u8; Self::LEN]>::try_from(bytes).ok().map(Self::from_bytes)
    }
}

/// End-of-stream conditions that leave a frame incomplete.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EofError {
    /// The peer closed before a full header arrived.
    #[error("connection closed mid-header: received {bytes_received} of {header_size} bytes")]
    MidHeader {
        /// Header bytes received before EOF.
        bytes_received: usize,
        /// Expected header size.
        header_size: usize,
    },
    /// The peer closed after the header but before the full payload.
    #[error("connection closed mid-frame: received {bytes_received} of {expected} payload bytes")]
    MidFrame {
        /// Payload bytes received before EOF.
        bytes_received: usize,
        /// Payload size announced by the header.
        expected: usize,
    },
}

/// Errors raised by [`GbxCodec`].
#[derive(Debug, Error)]
pub enum FrameError {
    /// Transport failure while reading or writing.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    /// A header announced a payload larger than the configured limit.
    #[error("frame payload of {size} bytes exceeds limit of {max}")]
    Oversized {
        /// Announced or attempted payload size.
        size: usize,
        /// Configured limit.
        max: usize,
    },
    /// The stream ended inside a frame.
    #[error(transparent)]
    Eof(#[from] EofError),
}

/// Encoder and decoder for [`GbxFrame`].
///
/// # Examples
///
/// ```
/// use bytes::BytesMut;
/// use gbxremote::{
///     HandlerId,
///     frame::{GbxCodec, GbxFrame},
/// };
/// use tokio_util::codec::{Decoder, Encoder};
///
/// let mut codec = GbxCodec::default();
/// let mut wire = BytesMut::new();
/// let frame = GbxFrame::new(HandlerId::FIRST_REQUEST, &b"<xml/>"[..]);
/// codec.encode(frame.clone(), &mut wire).expect("encode frame");
/// assert_eq!(codec.decode(&mut wire).expect("decode frame"), Some(frame));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct GbxCodec {
    max_payload: usize,
}

impl GbxCodec {
    /// Create a codec rejecting payloads larger than `max_payload`.
    ///
    /// The limit is clamped to
    /// [`MIN_PAYLOAD_LIMIT`]`..=`[`MAX_PAYLOAD_LIMIT`].
    #[must_use]
    pub fn new(max_payload: usize) -> Self {
        Self {
            max_payload: max_payload.clamp(MIN_PAYLOAD_LIMIT, MAX_PAYLOAD_LIMIT),
        }
    }

    /// Return the configured payload limit.
    #[must_use]
    pub const fn max_payload(&self) -> usize { self.max_payload }
}

impl Default for GbxCodec {
    fn default() -> Self { Self::new(DEFAULT_PAYLOAD_LIMIT) }
}

impl Decoder for GbxCodec {
    type Item = GbxFrame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(header) = FrameHeader::peek(src) else {
            src.reserve(FrameHeader::LEN - src.len());
            return Ok(None);
        };
        let size = header.size as usize;
        if size > self.max_payload {
            return Err(FrameError::Oversized {
                size,
                max: self.max_payload,
            });
        }
        let total = FrameHeader::LEN + size;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }
        src.advance(FrameHeader::LEN);
        let payload = src.split_to(size).freeze();
        Ok(Some(GbxFrame {
            handler: header.handler,
            payload,
        }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Clean close at a frame boundary.
        if src.is_empty() {
            return Ok(None);
        }
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None => Err(build_eof_error(src).into()),
        }
    }
}

/// Classify a truncated buffer as a mid-header or mid-frame close.
fn build_eof_error(src: &BytesMut) -> EofError {
    let bytes_received = src.len();
    match FrameHeader::peek(src) {
        Some(header) => EofError::MidFrame {
            bytes_received: bytes_received.saturating_sub(FrameHeader::LEN),
            expected: header.size as usize,
        },
        None => EofError::MidHeader {
            bytes_received,
            header_size: FrameHeader::LEN,
        },
    }
}

impl Encoder<GbxFrame> for GbxCodec {
    type Error = FrameError;

    fn encode(&mut self, item: GbxFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let size = item.payload.len();
        let oversized = FrameError::Oversized {
            size,
            max: self.max_payload,
        };
        if size > self.max_payload {
            return Err(oversized);
        }
        let size = u32::try_from(size).map_err(|_| oversized)?;
        let header = FrameHeader {
            size,
            handler: item.handler,
        };
        dst.reserve(FrameHeader::LEN + item.payload.len());
        dst.put_slice(&header.to_bytes());
        dst.put_slice(&item.payload);
        Ok(())
    }
}
