//! A scripted GBXRemote server on a local TCP port.

use std::{future::Future, net::SocketAddr};

use futures::{SinkExt, StreamExt};
use gbxremote::{
    Fault,
    HandlerId,
    Marshaler,
    Value,
    XmlRpcMarshaler,
    frame::{GbxCodec, GbxFrame},
    handshake::{GBXREMOTE_HEADER, write_handshake},
    marshal::Payload,
};
use tokio::{
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};
use tokio_util::codec::Framed;

/// Handler id the stub uses for notifications unless told otherwise.
const NOTIFICATION_HANDLER: HandlerId = HandlerId::new(0);

/// A server accepting exactly one connection and running a script on it.
#[derive(Debug)]
pub struct StubServer {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl StubServer {
    /// Bind, greet with `GBXRemote 2`, and run `script` on the connection.
    pub async fn spawn<F, Fut>(script: F) -> Self
    where
        F: FnOnce(ServerConnection) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::spawn_with_header(GBXREMOTE_HEADER, script).await
    }

    /// Like [`spawn`](Self::spawn) but greet with `header`.
    pub async fn spawn_with_header<F, Fut>(header: &str, script: F) -> Self
    where
        F: FnOnce(ServerConnection) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub listener address");
        let header = header.to_owned();
        let task = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept client");
            write_handshake(&mut stream, &header)
                .await
                .expect("write greeting");
            script(ServerConnection::new(stream)).await;
        });
        Self { addr, task }
    }

    /// Address the stub listens on.
    #[must_use]
    pub fn addr(&self) -> SocketAddr { self.addr }

    /// Wait for the script to finish, propagating any panic inside it.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            std::panic::resume_unwind(e.into_panic());
        }
    }
}

/// A method call received by the stub.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    /// Handler id the client assigned.
    pub handler: HandlerId,
    /// Called method.
    pub method: String,
    /// Positional parameters.
    pub params: Vec<Value>,
}

/// Server side of one accepted connection.
pub struct ServerConnection {
    frames: Framed<TcpStream, GbxCodec>,
}

impl ServerConnection {
    fn new(stream: TcpStream) -> Self {
        Self {
            frames: Framed::new(stream, GbxCodec::default()),
        }
    }

    /// Read the next request, or `None` once the client hangs up.
    pub async fn next_request(&mut self) -> Option<Request> {
        let frame = self.frames.next().await?.ok()?;
        match XmlRpcMarshaler
            .decode_payload(&frame.payload)
            .expect("client sent an undecodable payload")
        {
            Payload::Notification { method, params } => Some(Request {
                handler: frame.handler,
                method,
                params,
            }),
            other => panic!("client sent a non-call payload: {other:?}"),
        }
    }

    /// Read the next request, panicking if the client hung up.
    pub async fn expect_request(&mut self) -> Request {
        self.next_request()
            .await
            .expect("client closed before sending a request")
    }

    /// Read `n` requests.
    pub async fn expect_requests(&mut self, n: usize) -> Vec<Request> {
        let mut requests = Vec::with_capacity(n);
        for _ in 0..n {
            requests.push(self.expect_request().await);
        }
        requests
    }

    /// Answer `handler` with `value`.
    pub async fn reply(&mut self, handler: HandlerId, value: impl Into<Value>) {
        let payload = XmlRpcMarshaler
            .encode_response(&value.into())
            .expect("encode reply");
        self.send_raw(handler, payload).await;
    }

    /// Answer `handler` with a fault.
    pub async fn fault(&mut self, handler: HandlerId, code: i64, message: &str) {
        let payload = XmlRpcMarshaler.encode_fault(&Fault::new(code, message));
        self.send_raw(handler, payload).await;
    }

    /// Send a notification for `method`.
    pub async fn notify(&mut self, method: &str, params: &[Value]) {
        self.notify_with_handler(NOTIFICATION_HANDLER, method, params)
            .await;
    }

    /// Send a notification carrying an explicit handler id.
    pub async fn notify_with_handler(&mut self, handler: HandlerId, method: &str, params: &[Value]) {
        let payload = XmlRpcMarshaler
            .encode_call(method, params)
            .expect("encode notification");
        self.send_raw(handler, payload).await;
    }

    /// Send an arbitrary payload.
    pub async fn send_raw(&mut self, handler: HandlerId, payload: impl Into<bytes::Bytes>) {
        self.frames
            .send(GbxFrame::new(handler, payload))
            .await
            .expect("send frame");
    }

    /// Read until the client closes its side of the connection.
    pub async fn wait_for_close(mut self) {
        while let Some(Ok(_)) = self.frames.next().await {}
    }
}
