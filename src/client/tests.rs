//! Unit tests for the client runtime over in-memory transports.
//!
//! Each test plays the server side by hand on one end of a
//! `tokio::io::duplex` pipe, using the crate's own codec and marshaler.

use std::{
    io,
    pin::Pin,
    sync::{Arc, Mutex as StdMutex},
    task::{Context, Poll, Waker},
    time::Duration,
};

use futures::{SinkExt, StreamExt};
use rstest::rstest;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio_util::codec::Framed;
use tracing_test::traced_test;

use super::*;
use crate::{
    HandlerId,
    Value,
    frame::{GbxCodec, GbxFrame},
    handshake::{GBXREMOTE_HEADER, write_handshake},
    marshal::{Fault, Marshaler, Payload, XmlRpcMarshaler},
};

type ServerSide = Framed<DuplexStream, GbxCodec>;

async fn connected(builder: GbxRemoteClientBuilder) -> (GbxRemoteClient, ServerSide) {
    let (client_io, mut server_io) = tokio::io::duplex(64 * 1024);
    write_handshake(&mut server_io, GBXREMOTE_HEADER)
        .await
        .expect("write greeting");
    let client = builder
        .connect_stream(client_io, None)
        .await
        .expect("connect");
    (client, Framed::new(server_io, GbxCodec::default()))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum WriteMode {
    #[default]
    Open,
    Stalled,
    Broken,
}

#[derive(Default)]
struct GateState {
    mode: WriteMode,
    blocked: bool,
    waker: Option<Waker>,
}

/// Switch controlling the client's write half from the test.
#[derive(Clone, Default)]
struct WriteGate(Arc<StdMutex<GateState>>);

impl WriteGate {
    fn set(&self, mode: WriteMode) {
        let mut state = self.0.lock().expect("gate lock");
        state.mode = mode;
        if let Some(waker) = state.waker.take() {
            waker.wake();
        }
    }

    fn has_blocked(&self) -> bool { self.0.lock().expect("gate lock").blocked }
}

/// Duplex stream whose writes can be stalled or broken on demand.
struct GatedStream {
    inner: DuplexStream,
    gate: WriteGate,
}

impl AsyncRead for GatedStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for GatedStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let mut state = this.gate.0.lock().expect("gate lock");
        match state.mode {
            WriteMode::Open => {
                drop(state);
                Pin::new(&mut this.inner).poll_write(cx, buf)
            }
            WriteMode::Stalled => {
                state.blocked = true;
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            }
            WriteMode::Broken => Poll::Ready(Err(io::ErrorKind::BrokenPipe.into())),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.gate.0.lock().expect("gate lock").mode == WriteMode::Broken {
            return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
        }
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

async fn gated() -> (Arc<GbxRemoteClient>, ServerSide, WriteGate) {
    let (client_io, mut server_io) = tokio::io::duplex(64 * 1024);
    write_handshake(&mut server_io, GBXREMOTE_HEADER)
        .await
        .expect("write greeting");
    let gate = WriteGate::default();
    let stream = GatedStream {
        inner: client_io,
        gate: gate.clone(),
    };
    let client = GbxRemoteClientBuilder::new()
        .connect_stream(stream, None)
        .await
        .expect("connect");
    (
        Arc::new(client),
        Framed::new(server_io, GbxCodec::default()),
        gate,
    )
}

/// Read one request and return its handler id and method name.
async fn next_request(server: &mut ServerSide) -> (HandlerId, String) {
    let frame = server
        .next()
        .await
        .expect("request frame")
        .expect("decode frame");
    match XmlRpcMarshaler
        .decode_payload(&frame.payload)
        .expect("decode call")
    {
        Payload::Notification { method, .. } => (frame.handler, method),
        other => panic!("expected a method call, got {other:?}"),
    }
}

async fn reply(server: &mut ServerSide, handler: HandlerId, value: &Value) {
    let payload = XmlRpcMarshaler
        .encode_response(value)
        .expect("encode reply");
    server
        .send(GbxFrame::new(handler, payload))
        .await
        .expect("send reply");
}

#[tokio::test]
async fn execute_returns_reply_value() {
    let (client, mut server) = connected(GbxRemoteClientBuilder::new()).await;
    let (result, ()) = tokio::join!(client.execute("GetVersion", &[]), async {
        let (handler, method) = next_request(&mut server).await;
        assert_eq!(method, "GetVersion");
        assert_eq!(handler, HandlerId::FIRST_REQUEST);
        reply(&mut server, handler, &Value::from("2.11.26")).await;
    });
    assert_eq!(result.expect("reply"), Value::from("2.11.26"));
    assert_eq!(client.state(), ConnectionState::Ready);
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn fault_reply_is_returned_to_caller_only() {
    let (client, mut server) = connected(GbxRemoteClientBuilder::new()).await;
    let (result, ()) = tokio::join!(client.execute("Nope", &[]), async {
        let (handler, _) = next_request(&mut server).await;
        let payload = XmlRpcMarshaler.encode_fault(&Fault::new(-1000, "Unknown method"));
        server
            .send(GbxFrame::new(handler, payload))
            .await
            .expect("send fault");
    });
    let err = result.expect_err("fault");
    assert_eq!(err.fault(), Some(&Fault::new(-1000, "Unknown method")));
    assert!(!err.is_fatal());
    assert_eq!(client.state(), ConnectionState::Ready);
}

#[rstest]
#[case::falsy(Value::Bool(false), false)]
#[case::truthy(Value::Bool(true), true)]
#[case::zero(Value::Int(0), false)]
#[tokio::test]
async fn authenticate_checks_truthiness(#[case] answer: Value, #[case] accepted: bool) {
    let (client, mut server) = connected(GbxRemoteClientBuilder::new()).await;
    let (result, ()) = tokio::join!(client.authenticate("SuperAdmin", "secret"), async {
        let (handler, method) = next_request(&mut server).await;
        assert_eq!(method, "Authenticate");
        reply(&mut server, handler, &answer).await;
    });
    match result {
        Ok(()) => assert!(accepted),
        Err(ClientError::Authentication) => assert!(!accepted),
        Err(other) => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn reply_for_unknown_handler_closes_connection() {
    let (client, mut server) = connected(GbxRemoteClientBuilder::new()).await;
    let (result, ()) = tokio::join!(client.execute("GetStatus", &[]), async {
        let _ = next_request(&mut server).await;
        reply(&mut server, HandlerId::new(0x8000_0042), &Value::Nil).await;
    });
    let err = result.expect_err("connection closed");
    assert!(matches!(
        err,
        ClientError::Closed(CloseReason::UnexpectedHandler(id)) if id == HandlerId::new(0x8000_0042)
    ));
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn undecodable_payload_closes_connection() {
    let (client, mut server) = connected(GbxRemoteClientBuilder::new()).await;
    let (result, ()) = tokio::join!(client.execute("GetStatus", &[]), async {
        let (handler, _) = next_request(&mut server).await;
        server
            .send(GbxFrame::new(handler, &b"not xml at all"[..]))
            .await
            .expect("send garbage");
    });
    assert!(matches!(
        result.expect_err("closed"),
        ClientError::Closed(CloseReason::Protocol(_))
    ));
}

#[tokio::test]
async fn server_hangup_fails_pending_requests() {
    let (client, mut server) = connected(GbxRemoteClientBuilder::new()).await;
    let (result, ()) = tokio::join!(client.execute("GetStatus", &[]), async {
        let _ = next_request(&mut server).await;
        drop(server);
    });
    assert!(matches!(
        result.expect_err("closed"),
        ClientError::Closed(CloseReason::ClosedByPeer)
    ));
    assert_eq!(client.close_reason(), Some(CloseReason::ClosedByPeer));
}

#[tokio::test]
async fn unencodable_params_fail_only_that_call() {
    let (client, _server) = connected(GbxRemoteClientBuilder::new()).await;
    let err = client
        .execute("SetScore", &[Value::Double(f64::NAN)])
        .await
        .expect_err("NaN cannot be marshaled");
    assert!(matches!(err, ClientError::Marshal(_)));
    assert_eq!(client.state(), ConnectionState::Ready);
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn oversized_request_is_refused_without_closing() {
    let (client, _server) = connected(GbxRemoteClientBuilder::new().max_payload(64)).await;
    let err = client
        .execute("ChatSendServerMessage", &[Value::from("x".repeat(256))])
        .await
        .expect_err("too large");
    assert!(matches!(
        err,
        ClientError::Protocol(ProtocolError::FrameTooLarge { max: 64, .. })
    ));
    assert_eq!(client.pending_requests(), 0);
    assert_eq!(client.state(), ConnectionState::Ready);
}

#[tokio::test]
async fn abandoned_request_reply_is_discarded() {
    let (client, mut server) = connected(GbxRemoteClientBuilder::new()).await;
    let abandoned = tokio::time::timeout(Duration::from_millis(20), client.execute("Slow", &[]));
    let (timed_out, (handler, _)) = tokio::join!(abandoned, next_request(&mut server));
    assert!(timed_out.is_err(), "request should still be pending");

    reply(&mut server, handler, &Value::Nil).await;
    let (result, ()) = tokio::join!(client.execute("GetStatus", &[]), async {
        let (next, _) = next_request(&mut server).await;
        reply(&mut server, next, &Value::Int(4)).await;
    });
    assert_eq!(result.expect("connection still usable"), Value::Int(4));
}

#[tokio::test]
async fn write_failure_closes_connection_for_every_caller() {
    let (client, mut server, gate) = gated().await;
    let first = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.execute("First", &[]).await }
    });
    let (_, method) = next_request(&mut server).await;
    assert_eq!(method, "First");

    gate.set(WriteMode::Broken);
    let err = client.execute("Second", &[]).await.expect_err("write fails");
    assert!(matches!(err, ClientError::Connection(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
    assert!(err.is_fatal());
    assert_eq!(client.state(), ConnectionState::Closed);

    let first = tokio::time::timeout(Duration::from_secs(5), first)
        .await
        .expect("first caller woken")
        .expect("join")
        .expect_err("first caller fails");
    assert!(matches!(first, ClientError::Closed(CloseReason::Transport(_))));
    assert_eq!(client.pending_requests(), 0);

    let late = client.execute("Third", &[]).await.expect_err("closed");
    assert!(matches!(late, ClientError::Closed(CloseReason::Transport(_))));
    client.close().await;
}

#[tokio::test]
async fn request_abandoned_behind_blocked_writer_leaves_no_slot() {
    let (client, mut server, gate) = gated().await;
    gate.set(WriteMode::Stalled);
    let holder = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.execute("Holder", &[]).await }
    });
    while !gate.has_blocked() {
        tokio::task::yield_now().await;
    }

    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), client.execute("Abandoned", &[])).await;
    assert!(abandoned.is_err(), "request should be stuck behind the writer");
    assert_eq!(client.pending_requests(), 1);

    gate.set(WriteMode::Open);
    let (handler, method) = next_request(&mut server).await;
    assert_eq!(method, "Holder");
    reply(&mut server, handler, &Value::Bool(true)).await;
    let value = holder.await.expect("join").expect("holder reply");
    assert_eq!(value, Value::Bool(true));
    assert_eq!(client.pending_requests(), 0);
    assert_eq!(client.state(), ConnectionState::Ready);
}

#[tokio::test]
async fn close_is_idempotent_and_refuses_later_calls() {
    let (client, _server) = connected(GbxRemoteClientBuilder::new()).await;
    client.close().await;
    client.close().await;
    assert_eq!(client.state(), ConnectionState::Closed);
    let err = client.execute("GetStatus", &[]).await.expect_err("closed");
    assert!(matches!(err, ClientError::Closed(CloseReason::ClosedByClient)));
}

#[tokio::test(start_paused = true)]
async fn silent_server_hits_handshake_timeout() {
    let (client_io, _server_io) = tokio::io::duplex(1024);
    let err = GbxRemoteClientBuilder::new()
        .handshake_timeout(Duration::from_secs(1))
        .connect_stream(client_io, None)
        .await
        .expect_err("no greeting");
    assert!(matches!(err, ClientError::HandshakeTimeout));
}

#[rstest]
#[traced_test]
#[tokio::test]
async fn execute_emits_span_with_method_and_handler() {
    let (client, mut server) = connected(
        GbxRemoteClientBuilder::new()
            .tracing_config(TracingConfig::default().with_execute_timing(true)),
    )
    .await;
    let (result, ()) = tokio::join!(client.execute("GetVersion", &[]), async {
        let (handler, _) = next_request(&mut server).await;
        reply(&mut server, handler, &Value::Nil).await;
    });
    result.expect("reply");

    logs_assert(|lines: &[&str]| {
        lines
            .iter()
            .find(|line| {
                line.contains("client.execute")
                    && line.contains("GetVersion")
                    && line.contains("elapsed_us")
            })
            .map(|_| ())
            .ok_or_else(|| format!("client.execute span not found in:\n{}", lines.join("\n")))
    });
}

#[rstest]
#[traced_test]
#[tokio::test]
async fn close_emits_span() {
    let (client, _server) = connected(
        GbxRemoteClientBuilder::new().tracing_config(TracingConfig::default().with_close_timing(true)),
    )
    .await;
    client.close().await;

    assert!(logs_contain("client.close"));
}
