//! The `GBXRemote 2` greeting sent by the server on connect.
//!
//! The server writes a little-endian `u32` length followed by that many
//! bytes of ASCII. Nothing else may be read from the socket before the
//! header has been validated.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    byte_order::{read_wire_u32, write_wire_u32},
    client::{ClientError, ProtocolError},
};

/// The only protocol header this client accepts.
pub const GBXREMOTE_HEADER: &str = "GBXRemote 2";

/// Largest header length the client is willing to buffer.
pub const MAX_HEADER_LEN: usize = 1024;

/// Read and validate the server greeting.
///
/// # Errors
///
/// Returns [`ClientError::Connection`] if the stream fails or ends early,
/// [`ProtocolError::HeaderTooLong`] if the announced length exceeds
/// [`MAX_HEADER_LEN`], and [`ProtocolError::UnsupportedServer`] if the text
/// differs from [`GBXREMOTE_HEADER`].
///
/// # Examples
///
/// ```
/// use gbxremote::handshake::read_handshake;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut wire: &[u8] = &[11, 0, 0, 0, b'G', b'B', b'X', b'R', b'e', b'm', b'o', b't', b'e', b' ', b'2'];
/// read_handshake(&mut wire).await.expect("valid greeting");
/// # }
/// ```
pub async fn read_handshake<R>(reader: &mut R) -> Result<(), ClientError>
where
    R: AsyncRead + Unpin,
{
    let mut len = [0u8; 4];
    reader.read_exact(&mut len).await?;
    let length = read_wire_u32(len);
    let Ok(size) = usize::try_from(length) else {
        return Err(header_too_long(length));
    };
    if size > MAX_HEADER_LEN {
        return Err(header_too_long(length));
    }
    let mut header = vec![0u8; size];
    reader.read_exact(&mut header).await?;
    if header == GBXREMOTE_HEADER.as_bytes() {
        Ok(())
    } else {
        Err(ProtocolError::UnsupportedServer {
            header: String::from_utf8_lossy(&header).into_owned(),
        }
        .into())
    }
}

/// Write a greeting carrying `header`.
///
/// Used by servers and test doubles; the client never writes a greeting.
///
/// # Errors
///
/// Propagates any I/O error from `writer`.
pub async fn write_handshake<W>(writer: &mut W, header: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let length = u32::try_from(header.len())
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "header too long"))?;
    writer.write_all(&write_wire_u32(length)).await?;
    writer.write_all(header.as_bytes()).await?;
    writer.flush().await
}

fn header_too_long(length: u32) -> ClientError {
    ProtocolError::HeaderTooLong {
        length,
        max: MAX_HEADER_LEN,
    }
    .into()
}
