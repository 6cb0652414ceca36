//! The connected GBXRemote client.

use std::{
    fmt,
    net::SocketAddr,
    sync::{
        Arc,
        Mutex as StdMutex,
        PoisonError,
        atomic::{AtomicU8, Ordering},
    },
    time::Instant,
};

use futures::SinkExt;
use log::{debug, error, info};
use tokio::{io::AsyncWrite, sync::Mutex, task::JoinHandle};
use tokio_util::{codec::FramedWrite, sync::CancellationToken};
use tracing::{Instrument, Span};

use super::{
    ClientError,
    CloseReason,
    GbxRemoteClientBuilder,
    tracing_config::TracingConfig,
    tracing_helpers::{close_span, emit_timing_event, execute_span},
};
use crate::{
    dispatcher::{CallbackDispatcher, Interest, ListenerId, Notification},
    frame::{FrameError, GbxCodec, GbxFrame},
    handler_id::{HandlerId, HandlerIdAllocator},
    marshal::Marshaler,
    metrics::{self, Direction},
    pending::PendingRequestTable,
    value::Value,
};

pub(crate) type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Lifecycle of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// No socket has been opened yet.
    Unconnected = 0,
    /// The socket is open and the greeting is being validated.
    Handshaking = 1,
    /// The receive loop is running and requests are accepted.
    Ready = 2,
    /// The connection ended; every request fails with
    /// [`ClientError::Closed`].
    Closed = 3,
}

impl ConnectionState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Unconnected,
            1 => Self::Handshaking,
            2 => Self::Ready,
            _ => Self::Closed,
        }
    }
}

/// State shared between the client handle and its receive loop.
pub(crate) struct Shared {
    pub(crate) pending: PendingRequestTable,
    pub(crate) dispatcher: CallbackDispatcher,
    pub(crate) marshaler: Arc<dyn Marshaler>,
    state: AtomicU8,
}

impl Shared {
    pub(crate) fn new(marshaler: Arc<dyn Marshaler>) -> Self {
        Self {
            pending: PendingRequestTable::new(),
            dispatcher: CallbackDispatcher::new(),
            marshaler,
            state: AtomicU8::new(ConnectionState::Unconnected as u8),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        debug!("connection state changed: state={state:?}");
        self.state.store(state as u8, Ordering::Release);
    }

    /// Refuse new requests and fail the outstanding ones with `reason`.
    pub(crate) fn shut(&self, reason: CloseReason) {
        self.set_state(ConnectionState::Closed);
        self.pending.fail_all(reason);
    }
}

/// Removes a registered slot unless its frame reached the writer.
///
/// A frame handed to the writer may still go out after its caller gives up,
/// so from then on the slot must stay to absorb the reply.
struct Registration<'a> {
    pending: &'a PendingRequestTable,
    id: HandlerId,
    armed: bool,
}

impl<'a> Registration<'a> {
    fn new(pending: &'a PendingRequestTable, id: HandlerId) -> Self {
        Self {
            pending,
            id,
            armed: true,
        }
    }

    fn disarm(&mut self) { self.armed = false; }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        if self.armed && self.pending.cancel(self.id) {
            debug!("request withdrawn before it was written: handler={}", self.id);
        }
    }
}

/// A live connection to a GBXRemote server.
///
/// The client is shared by reference: `execute` takes `&self`, so many
/// tasks may issue requests concurrently through one `Arc<GbxRemoteClient>`.
/// Replies are matched by handler id and may arrive in any order.
///
/// # Examples
///
/// ```no_run
/// use gbxremote::{ClientError, GbxRemoteClient, Value};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), ClientError> {
/// let client = GbxRemoteClient::connect("127.0.0.1", 5000).await?;
/// client.authenticate("SuperAdmin", "SuperAdmin").await?;
/// let version = client.execute("GetVersion", &[]).await?;
/// println!("{version}");
/// client.close().await;
/// # Ok(())
/// # }
/// ```
pub struct GbxRemoteClient {
    pub(crate) writer: Mutex<Option<FramedWrite<BoxedWriter, GbxCodec>>>,
    pub(crate) shared: Arc<Shared>,
    pub(crate) ids: HandlerIdAllocator,
    pub(crate) shutdown: CancellationToken,
    pub(crate) receive_task: StdMutex<Option<JoinHandle<()>>>,
    pub(crate) tracing_config: TracingConfig,
    pub(crate) peer_addr: Option<SocketAddr>,
}

impl fmt::Debug for GbxRemoteClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GbxRemoteClient")
            .field("peer_addr", &self.peer_addr)
            .field("state", &self.shared.state())
            .field("pending", &self.shared.pending.len())
            .finish_non_exhaustive()
    }
}

impl GbxRemoteClient {
    /// Start building a client with default settings.
    #[must_use]
    pub fn builder() -> GbxRemoteClientBuilder { GbxRemoteClientBuilder::new() }

    /// Connect to `host:port` with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Connection`] if no address accepts the
    /// connection and [`ClientError::Protocol`] if the server greeting is
    /// not `GBXRemote 2`.
    pub async fn connect(host: &str, port: u16) -> Result<Self, ClientError> {
        Self::builder().connect_host(host, port).await
    }

    /// Call `method` and wait for its reply.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Fault`] if the server answered with a fault.
    /// - [`ClientError::Marshal`] if `params` cannot be encoded.
    /// - [`ClientError::Closed`] if the connection ends before the reply.
    /// - [`ClientError::Connection`] if the frame cannot be written; the
    ///   connection is then closed and every other caller fails too.
    pub async fn execute(&self, method: &str, params: &[Value]) -> Result<Value, ClientError> {
        let span = execute_span(&self.tracing_config, method);
        let start = self.tracing_config.execute_timing.then(Instant::now);
        async {
            let result = self.execute_inner(method, params).await;
            let outcome = match &result {
                Ok(_) => "ok",
                Err(ClientError::Fault(_)) => "fault",
                Err(_) => "error",
            };
            Span::current().record("result", outcome);
            emit_timing_event(start);
            result
        }
        .instrument(span)
        .await
    }

    async fn execute_inner(&self, method: &str, params: &[Value]) -> Result<Value, ClientError> {
        let payload = self.shared.marshaler.encode_call(method, params)?;
        let id = self.ids.next_id();
        Span::current().record("handler", tracing::field::display(id));
        // Register before writing so a fast reply always finds its slot.
        let slot = self.shared.pending.register(id)?;
        let mut registration = Registration::new(&self.shared.pending, id);
        self.write_frame(GbxFrame::new(id, payload), &mut registration)
            .await?;
        metrics::inc_requests();
        match slot.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ClientError::Closed(self.close_reason_or(CloseReason::ClosedByClient))),
        }
    }

    /// Write one request frame under the writer lock.
    ///
    /// `registration` is disarmed as soon as the frame sits in the writer's
    /// buffer. A transport error is fatal: the connection is shut with
    /// [`CloseReason::Transport`] and the writer, along with any bytes it
    /// still buffers, is dropped. An oversized frame fails only this call.
    async fn write_frame(
        &self,
        frame: GbxFrame,
        registration: &mut Registration<'_>,
    ) -> Result<(), ClientError> {
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(ClientError::Closed(self.close_reason_or(CloseReason::ClosedByClient)));
        };
        let written = match writer.feed(frame).await {
            Ok(()) => {
                registration.disarm();
                writer.flush().await
            }
            Err(e) => Err(e),
        };
        match written {
            Ok(()) => {
                metrics::inc_frames(Direction::Outbound);
                Ok(())
            }
            Err(FrameError::Io(e)) => {
                error!("write failed, closing connection: error={e}");
                tracing::error!(error = %e, "write failed");
                self.shared.shut(CloseReason::Transport(e.to_string()));
                self.shutdown.cancel();
                guard.take();
                Err(ClientError::Connection(e))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Log in with `Authenticate(user, password)`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Authentication`] if the server answers with a
    /// falsy value, or any error from [`execute`](Self::execute).
    pub async fn authenticate(&self, user: &str, password: &str) -> Result<(), ClientError> {
        let reply = self
            .execute("Authenticate", &[Value::from(user), Value::from(password)])
            .await?;
        if reply.is_truthy() {
            Ok(())
        } else {
            Err(ClientError::Authentication)
        }
    }

    /// Register a listener for server notifications.
    ///
    /// Pass [`Interest::All`] to see every notification, or a
    /// [`Callback`](crate::Callback) to see only that one. Listeners run on
    /// the receive loop, so they should return quickly.
    pub fn register_callback_handler<F>(
        &self,
        interest: impl Into<Interest>,
        listener: F,
    ) -> ListenerId
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.shared.dispatcher.register(interest, listener)
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unregister_callback_handler(&self, id: ListenerId) -> bool {
        self.shared.dispatcher.unregister(id)
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState { self.shared.state() }

    /// Why the connection ended, once it has.
    #[must_use]
    pub fn close_reason(&self) -> Option<CloseReason> { self.shared.pending.close_reason().cloned() }

    /// Number of requests awaiting a reply.
    #[must_use]
    pub fn pending_requests(&self) -> usize { self.shared.pending.len() }

    /// Address of the server, when connected over TCP.
    #[must_use]
    pub fn peer_addr(&self) -> Option<SocketAddr> { self.peer_addr }

    /// Stop the receive loop and release the socket.
    ///
    /// Outstanding requests fail with
    /// [`CloseReason::ClosedByClient`]. Calling `close` again, or after the
    /// server already went away, does nothing further.
    pub async fn close(&self) {
        let span = close_span(&self.tracing_config);
        let start = self.tracing_config.close_timing.then(Instant::now);
        async {
            self.shutdown.cancel();
            self.shared.shut(CloseReason::ClosedByClient);
            let task = self
                .receive_task
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(task) = task
                && let Err(e) = task.await
            {
                debug!("receive loop ended abnormally: error={e}");
            }
            if let Some(mut writer) = self.writer.lock().await.take() {
                // The peer may already be gone; there is nothing left to report.
                let _ = writer.close().await;
                info!("connection closed: peer_addr={:?}", self.peer_addr);
            }
            emit_timing_event(start);
        }
        .instrument(span)
        .await;
    }

    fn close_reason_or(&self, fallback: CloseReason) -> CloseReason {
        self.close_reason().unwrap_or(fallback)
    }
}

impl Drop for GbxRemoteClient {
    fn drop(&mut self) { self.shutdown.cancel(); }
}
