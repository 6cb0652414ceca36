//! Connection establishment for `GbxRemoteClientBuilder`.

use std::{
    io,
    net::SocketAddr,
    sync::{Arc, Mutex as StdMutex},
    time::Instant,
};

use log::{info, warn};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpSocket, lookup_host},
    sync::Mutex,
    time::timeout,
};
use tokio_util::{
    codec::{FramedRead, FramedWrite},
    sync::CancellationToken,
};
use tracing::Instrument;

use super::GbxRemoteClientBuilder;
use crate::{
    client::{
        ClientError,
        ConnectionState,
        GbxRemoteClient,
        receive_loop,
        runtime::{BoxedWriter, Shared},
        tracing_helpers::{connect_span, emit_timing_event},
    },
    frame::GbxCodec,
    handler_id::HandlerIdAllocator,
    handshake::read_handshake,
};

impl GbxRemoteClientBuilder {
    /// Resolve `host` and connect to the first address that accepts.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Connection`] if resolution fails or no address
    /// accepts, otherwise any error from [`connect`](Self::connect).
    pub async fn connect_host(self, host: &str, port: u16) -> Result<GbxRemoteClient, ClientError> {
        let mut last_err = None;
        for addr in lookup_host((host, port)).await? {
            match self.open_socket(addr).await {
                Ok(stream) => return self.connect_stream(stream, Some(addr)).await,
                Err(e) => {
                    warn!("connect attempt failed: addr={addr}, error={e}");
                    last_err = Some(e);
                }
            }
        }
        Err(ClientError::Connection(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no address for {host}:{port}"))
        })))
    }

    /// Connect to `addr`, validate the greeting and start the receive loop.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Connection`] if the socket cannot be opened,
    /// [`ClientError::Protocol`] if the greeting is wrong and
    /// [`ClientError::HandshakeTimeout`] if it does not arrive in time.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::net::SocketAddr;
    ///
    /// use gbxremote::{ClientError, GbxRemoteClient};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), ClientError> {
    /// let addr: SocketAddr = "127.0.0.1:5000".parse().expect("valid socket address");
    /// let client = GbxRemoteClient::builder().nodelay(true).connect(addr).await?;
    /// client.close().await;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(self, addr: SocketAddr) -> Result<GbxRemoteClient, ClientError> {
        let stream = self.open_socket(addr).await?;
        self.connect_stream(stream, Some(addr)).await
    }

    async fn open_socket(&self, addr: SocketAddr) -> io::Result<tokio::net::TcpStream> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        self.socket_options.apply(&socket)?;
        socket.connect(addr).await
    }

    /// Run the handshake over an already-open transport.
    ///
    /// Socket options do not apply here. On failure the stream is dropped
    /// and no background task is left running.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`] if the greeting is wrong and
    /// [`ClientError::HandshakeTimeout`] if it does not arrive in time.
    pub async fn connect_stream<S>(
        self,
        stream: S,
        peer_addr: Option<SocketAddr>,
    ) -> Result<GbxRemoteClient, ClientError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let peer = peer_addr.map_or_else(|| "stream".to_owned(), |a| a.to_string());
        let span = connect_span(&self.tracing_config, &peer);
        let start = self.tracing_config.connect_timing.then(Instant::now);
        let result = self.establish(stream, peer_addr).instrument(span.clone()).await;
        span.in_scope(|| emit_timing_event(start));
        result
    }

    async fn establish<S>(
        self,
        stream: S,
        peer_addr: Option<SocketAddr>,
    ) -> Result<GbxRemoteClient, ClientError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let shared = Arc::new(Shared::new(self.marshaler));
        let (mut reader, writer) = tokio::io::split(stream);

        shared.set_state(ConnectionState::Handshaking);
        let handshake = read_handshake(&mut reader);
        match self.handshake_timeout {
            Some(limit) => timeout(limit, handshake)
                .await
                .unwrap_or(Err(ClientError::HandshakeTimeout))?,
            None => handshake.await?,
        }

        let codec = GbxCodec::new(self.max_payload);
        let frames = FramedRead::new(reader, codec);
        let writer: BoxedWriter = Box::new(writer);
        let shutdown = CancellationToken::new();
        shared.set_state(ConnectionState::Ready);
        let task = tokio::spawn(receive_loop::run(
            frames,
            Arc::clone(&shared),
            shutdown.clone(),
        ));
        info!("connected to GBXRemote server: peer_addr={peer_addr:?}");

        Ok(GbxRemoteClient {
            writer: Mutex::new(Some(FramedWrite::new(writer, codec))),
            shared,
            ids: HandlerIdAllocator::starting_at(self.first_handler),
            shutdown,
            receive_task: StdMutex::new(Some(task)),
            tracing_config: self.tracing_config,
            peer_addr,
        })
    }
}
