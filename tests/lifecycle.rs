//! Connection teardown: close, server hangup and fatal protocol errors.

use std::{sync::Arc, time::Duration};

use gbxremote::{ClientError, CloseReason, ConnectionState, GbxRemoteClient, HandlerId, Value};
use gbxremote_testing::{LoggerHandle, StubServer, logger};
use rstest::rstest;
use tokio::time::timeout;

const LIMIT: Duration = Duration::from_secs(5);

async fn settle(tasks: Vec<tokio::task::JoinHandle<Result<Value, ClientError>>>) -> Vec<ClientError> {
    let mut errors = Vec::with_capacity(tasks.len());
    for task in tasks {
        let outcome = timeout(LIMIT, task)
            .await
            .expect("caller woken")
            .expect("join");
        errors.push(outcome.expect_err("request must fail"));
    }
    errors
}

fn spawn_pending(client: &Arc<GbxRemoteClient>, count: usize) -> Vec<tokio::task::JoinHandle<Result<Value, ClientError>>> {
    (0..count)
        .map(|_| {
            let client = Arc::clone(client);
            tokio::spawn(async move { client.execute("NeverAnswered", &[]).await })
        })
        .collect()
}

#[rstest]
#[case(1)]
#[case(5)]
#[tokio::test]
async fn close_resolves_every_outstanding_request(#[case] outstanding: usize) {
    let server = StubServer::spawn(move |mut conn| async move {
        let _ = conn.expect_requests(outstanding).await;
        conn.wait_for_close().await;
    })
    .await;
    let client = Arc::new(
        GbxRemoteClient::builder()
            .connect(server.addr())
            .await
            .expect("connect"),
    );
    let tasks = spawn_pending(&client, outstanding);
    while client.pending_requests() < outstanding {
        tokio::task::yield_now().await;
    }

    client.close().await;
    for err in settle(tasks).await {
        assert!(matches!(err, ClientError::Closed(CloseReason::ClosedByClient)));
    }
    assert_eq!(client.state(), ConnectionState::Closed);
    assert_eq!(client.pending_requests(), 0);
    timeout(LIMIT, server.join()).await.expect("socket released");
}

#[tokio::test]
async fn server_hangup_resolves_outstanding_requests() {
    let server = StubServer::spawn(|mut conn| async move {
        let _ = conn.expect_requests(3).await;
    })
    .await;
    let client = Arc::new(
        GbxRemoteClient::builder()
            .connect(server.addr())
            .await
            .expect("connect"),
    );
    let tasks = spawn_pending(&client, 3);

    for err in settle(tasks).await {
        assert!(matches!(err, ClientError::Closed(CloseReason::ClosedByPeer)));
    }
    assert_eq!(client.state(), ConnectionState::Closed);
    let late = client.execute("GetStatus", &[]).await.expect_err("closed");
    assert!(matches!(late, ClientError::Closed(CloseReason::ClosedByPeer)));

    // Closing a connection the server already dropped is harmless.
    client.close().await;
    client.close().await;
    server.join().await;
}

#[rstest]
#[tokio::test]
async fn unexpected_handler_is_fatal_and_logged(mut logger: LoggerHandle) {
    logger.clear();
    let server = StubServer::spawn(|mut conn| async move {
        let request = conn.expect_request().await;
        conn.reply(HandlerId::new(request.handler.as_u32() ^ 0x0F), Value::Nil)
            .await;
        conn.wait_for_close().await;
    })
    .await;
    let client = GbxRemoteClient::builder()
        .connect(server.addr())
        .await
        .expect("connect");

    let err = client.execute("GetStatus", &[]).await.expect_err("fatal");
    assert!(matches!(
        err,
        ClientError::Closed(CloseReason::UnexpectedHandler(id)) if id == HandlerId::new(0x8000_000F)
    ));
    assert!(
        logger.drain_contains(&["unexpected handler", "0x8000000f"]),
        "missing unexpected handler log"
    );
    client.close().await;
    server.join().await;
}

#[tokio::test]
async fn authenticate_succeeds_and_rejects() {
    let server = StubServer::spawn(|mut conn| async move {
        let good = conn.expect_request().await;
        assert_eq!(good.method, "Authenticate");
        assert_eq!(
            good.params,
            [Value::from("SuperAdmin"), Value::from("SuperAdmin")]
        );
        conn.reply(good.handler, true).await;
        let bad = conn.expect_request().await;
        conn.fault(bad.handler, -200, "Authentication failed.").await;
        let falsy = conn.expect_request().await;
        conn.reply(falsy.handler, false).await;
        conn.wait_for_close().await;
    })
    .await;
    let client = GbxRemoteClient::builder()
        .connect(server.addr())
        .await
        .expect("connect");

    client
        .authenticate("SuperAdmin", "SuperAdmin")
        .await
        .expect("authenticated");
    let fault = client
        .authenticate("SuperAdmin", "wrong")
        .await
        .expect_err("fault");
    assert_eq!(fault.fault().map(|f| f.code), Some(-200));
    let falsy = client
        .authenticate("User", "User")
        .await
        .expect_err("falsy reply");
    assert!(matches!(falsy, ClientError::Authentication));
    assert_eq!(client.state(), ConnectionState::Ready);
    client.close().await;
    server.join().await;
}
