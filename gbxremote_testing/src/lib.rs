//! Test doubles for exercising [`gbxremote`] clients over real sockets.
//!
//! [`StubServer`] binds an ephemeral local port, sends a greeting, and hands
//! the accepted connection to a test-provided script that reads requests
//! and writes replies, faults and notifications in whatever order the test
//! needs.
//!
//! ```rust,no_run
//! use gbxremote::{GbxRemoteClient, Value};
//! use gbxremote_testing::StubServer;
//!
//! # async fn example() {
//! let server = StubServer::spawn(|mut conn| async move {
//!     let request = conn.expect_request().await;
//!     conn.reply(request.handler, Value::from("pong")).await;
//! })
//! .await;
//! let client = GbxRemoteClient::builder()
//!     .connect(server.addr())
//!     .await
//!     .expect("connect");
//! assert_eq!(
//!     client.execute("Ping", &[]).await.expect("reply"),
//!     Value::from("pong")
//! );
//! # }
//! ```

pub mod logging;
mod stub_server;

pub use logging::{LoggerHandle, logger};
pub use stub_server::{Request, ServerConnection, StubServer};
