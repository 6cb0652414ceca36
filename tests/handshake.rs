//! Handshake acceptance and rejection against a real socket.

use std::time::Duration;

use gbxremote::{ClientError, ConnectionState, GbxRemoteClient, ProtocolError};
use gbxremote_testing::StubServer;
use rstest::rstest;
use tokio::time::timeout;

const JOIN_LIMIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn accepts_gbxremote_2_greeting() {
    let server = StubServer::spawn(|conn| conn.wait_for_close()).await;
    let client = GbxRemoteClient::builder()
        .connect(server.addr())
        .await
        .expect("connect");
    assert_eq!(client.state(), ConnectionState::Ready);
    assert_eq!(client.peer_addr(), Some(server.addr()));

    client.close().await;
    timeout(JOIN_LIMIT, server.join())
        .await
        .expect("server saw the socket close");
}

#[rstest]
#[case::older_protocol("GBXRemote 1")]
#[case::other_service("SSH-2.0-OpenSSH")]
#[tokio::test]
async fn rejects_other_greetings_and_drops_socket(#[case] header: &'static str) {
    let server = StubServer::spawn_with_header(header, |conn| conn.wait_for_close()).await;
    let err = GbxRemoteClient::builder()
        .connect(server.addr())
        .await
        .expect_err("handshake rejected");

    assert!(matches!(
        &err,
        ClientError::Protocol(ProtocolError::UnsupportedServer { header: got }) if got == header
    ));
    assert!(err.to_string().contains("unsupported or non-GBXRemote server"));
    // The stub only finishes once the client has released the socket.
    timeout(JOIN_LIMIT, server.join())
        .await
        .expect("client released the socket");
}

#[tokio::test]
async fn refused_connection_is_a_connection_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let err = GbxRemoteClient::builder()
        .connect(addr)
        .await
        .expect_err("nothing listening");
    assert!(matches!(err, ClientError::Connection(_)));
}

#[tokio::test]
async fn connect_by_host_name_resolves_localhost() {
    let server = StubServer::spawn(|conn| conn.wait_for_close()).await;
    let client = GbxRemoteClient::connect("127.0.0.1", server.addr().port())
        .await
        .expect("connect by host");
    client.close().await;
    timeout(JOIN_LIMIT, server.join()).await.expect("server done");
}
