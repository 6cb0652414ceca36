//! Helpers for the little-endian integers used on the GBXRemote wire.
//!
//! Every length and handler id in the protocol is an unsigned 32-bit value
//! in little-endian order. Keeping the conversions here leaves exactly one
//! place where wire endianness is decided.

/// Serialise a `u32` in wire byte order (little-endian).
///
/// # Examples
///
/// ```
/// use gbxremote::byte_order::write_wire_u32;
///
/// assert_eq!(write_wire_u32(0x1234_5678), [0x78, 0x56, 0x34, 0x12]);
/// ```
#[must_use]
pub fn write_wire_u32(value: u32) -> [u8; 4] { value.to_le_bytes() }

/// Parse a wire-order `u32` from its on-wire representation.
///
/// # Examples
///
/// ```
/// use gbxremote::byte_order::read_wire_u32;
///
/// assert_eq!(read_wire_u32([0x78, 0x56, 0x34, 0x12]), 0x1234_5678);
/// ```
#[must_use]
pub fn read_wire_u32(bytes: [u8; 4]) -> u32 { u32::from_le_bytes(bytes) }
