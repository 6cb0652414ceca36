//! Notification demultiplexing and listener fan-out.

use std::time::Duration;

use gbxremote::{Callback, GbxRemoteClient, Interest, Notification, Value};
use gbxremote_testing::StubServer;
use tokio::{sync::mpsc, time::timeout};

const RECV_LIMIT: Duration = Duration::from_secs(5);

fn collector() -> (
    impl Fn(&Notification) + Send + Sync + 'static,
    mpsc::UnboundedReceiver<Notification>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let listener = move |n: &Notification| {
        // The test may have stopped listening; nothing to do then.
        let _ = tx.send(n.clone());
    };
    (listener, rx)
}

async fn recv(rx: &mut mpsc::UnboundedReceiver<Notification>) -> Notification {
    timeout(RECV_LIMIT, rx.recv())
        .await
        .expect("notification in time")
        .expect("listener alive")
}

#[tokio::test]
async fn notification_never_resolves_a_pending_request() {
    let server = StubServer::spawn(|mut conn| async move {
        let request = conn.expect_request().await;
        // Same handler id as the pending call: payload shape decides.
        conn.notify_with_handler(
            request.handler,
            "TrackMania.PlayerConnect",
            &[Value::from("login"), Value::Bool(false)],
        )
        .await;
        conn.reply(request.handler, Value::from("the reply")).await;
        conn.wait_for_close().await;
    })
    .await;
    let client = GbxRemoteClient::builder()
        .connect(server.addr())
        .await
        .expect("connect");
    let (listener, mut rx) = collector();
    client.register_callback_handler(Interest::All, listener);

    let value = client.execute("GetStatus", &[]).await.expect("reply");
    assert_eq!(value, Value::from("the reply"));

    let notification = recv(&mut rx).await;
    assert_eq!(notification.callback, Some(Callback::PlayerConnect));
    assert_eq!(
        notification.params,
        [Value::from("login"), Value::Bool(false)]
    );
    client.close().await;
    server.join().await;
}

#[tokio::test]
async fn notifications_reach_exactly_the_registered_listeners() {
    let server = StubServer::spawn(|mut conn| async move {
        let request = conn.expect_request().await;
        conn.notify("TrackMania.PlayerChat", &[Value::from(0), Value::from("hi")])
            .await;
        conn.notify("TrackMania.BeginRound", &[]).await;
        conn.reply(request.handler, true).await;
        conn.wait_for_close().await;
    })
    .await;
    let client = GbxRemoteClient::builder()
        .connect(server.addr())
        .await
        .expect("connect");

    let (all, mut all_rx) = collector();
    let (chat, mut chat_rx) = collector();
    let (removed, mut removed_rx) = collector();
    client.register_callback_handler(Interest::All, all);
    client.register_callback_handler(Callback::PlayerChat, chat);
    let removed_id = client.register_callback_handler(Interest::All, removed);
    assert!(client.unregister_callback_handler(removed_id));
    assert!(!client.unregister_callback_handler(removed_id));

    client.execute("Barrier", &[]).await.expect("reply");

    assert_eq!(recv(&mut all_rx).await.method, "TrackMania.PlayerChat");
    assert_eq!(recv(&mut all_rx).await.method, "TrackMania.BeginRound");
    assert_eq!(recv(&mut chat_rx).await.method, "TrackMania.PlayerChat");
    assert!(chat_rx.try_recv().is_err(), "chat listener saw another callback");
    assert!(removed_rx.try_recv().is_err(), "removed listener was invoked");
    client.close().await;
    server.join().await;
}

#[tokio::test]
async fn panicking_listener_does_not_stop_the_receive_loop() {
    let server = StubServer::spawn(|mut conn| async move {
        let request = conn.expect_request().await;
        conn.notify("TrackMania.ServerStart", &[]).await;
        conn.reply(request.handler, Value::from("still alive")).await;
        conn.wait_for_close().await;
    })
    .await;
    let client = GbxRemoteClient::builder()
        .connect(server.addr())
        .await
        .expect("connect");
    client.register_callback_handler(Interest::All, |_: &Notification| panic!("listener boom"));
    let (after, mut after_rx) = collector();
    client.register_callback_handler(Interest::All, after);

    let value = client.execute("GetStatus", &[]).await.expect("reply");
    assert_eq!(value, Value::from("still alive"));
    assert_eq!(recv(&mut after_rx).await.callback, Some(Callback::ServerStart));
    client.close().await;
    server.join().await;
}

#[tokio::test]
async fn echo_round_trip_delivers_echo_callback() {
    let server = StubServer::spawn(|mut conn| async move {
        let request = conn.expect_request().await;
        assert_eq!(request.method, "Echo");
        assert_eq!(
            request.params,
            [Value::from("echo param 1"), Value::from("custom")]
        );
        conn.reply(request.handler, true).await;
        conn.notify("TrackMania.Echo", &request.params).await;
        conn.wait_for_close().await;
    })
    .await;
    let client = GbxRemoteClient::builder()
        .connect(server.addr())
        .await
        .expect("connect");
    let (listener, mut rx) = collector();
    client.register_callback_handler(Callback::Echo, listener);

    assert!(client.echo(None, Some("custom")).await.expect("echo"));
    let echoed = recv(&mut rx).await;
    assert_eq!(echoed.params[1], Value::from("custom"));
    client.close().await;
    server.join().await;
}
