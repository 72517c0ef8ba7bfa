mod common;

use std::net::SocketAddr;
use std::time::Duration;

use common::{config, fake_worker, FakeWorker};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use sfu_signal_server::Server;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Running {
    addr: SocketAddr,
    server: Server,
    fake: FakeWorker,
    shutdown: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

async fn start() -> Running {
    let (worker, fake) = fake_worker();
    let server = Server::with_workers(config(), vec![worker]);
    server.start_supervisor();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown, rx) = oneshot::channel::<()>();
    let serving = server.clone();
    let task = tokio::spawn(async move {
        serving
            .serve(listener, async {
                let _ = rx.await;
            })
            .await
            .unwrap();
    });
    Running {
        addr,
        server,
        fake,
        shutdown: Some(shutdown),
        task,
    }
}

async fn recv_json(client: &mut Client) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .expect("timed out waiting for a message")
            .expect("connection ended")
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn call(client: &mut Client, id: u32, method: &str, data: Value) -> Value {
    let request = json!({"request": true, "id": id, "method": method, "data": data});
    client.send(Message::Text(request.to_string())).await.unwrap();
    loop {
        let message = recv_json(client).await;
        if message["response"] == true && message["id"] == id {
            return message;
        }
    }
}

#[tokio::test]
async fn handshake_without_peer_id_is_refused() {
    let running = start().await;
    let url = format!("ws://{}/?roomId=lobby", running.addr);

    match connect_async(url).await {
        Err(WsError::Http(response)) => assert_eq!(response.status(), StatusCode::BAD_REQUEST),
        Err(err) => panic!("expected an HTTP rejection, got {err}"),
        Ok(_) => panic!("handshake without peerId was accepted"),
    }
    assert!(running.server.room_ids().await.is_empty());
}

#[tokio::test]
async fn requests_round_trip_over_the_socket() {
    let mut running = start().await;
    let mut request = format!("ws://{}/?roomId=lobby&peerId=alice", running.addr)
        .into_client_request()
        .unwrap();
    request
        .headers_mut()
        .insert("Sec-WebSocket-Protocol", HeaderValue::from_static("protoo"));
    let (mut client, response) = connect_async(request).await.unwrap();
    assert_eq!(
        response.headers().get("Sec-WebSocket-Protocol").unwrap(),
        "protoo"
    );

    let caps = call(&mut client, 1, "getRouterRtpCapabilities", json!({})).await;
    assert_eq!(caps["ok"], true);
    assert!(caps["data"]["codecs"].as_array().unwrap().len() >= 3);

    let joined = call(&mut client, 2, "join", json!({"displayName": "Alice"})).await;
    assert_eq!(joined["data"]["peers"], json!([]));

    let unknown = call(&mut client, 3, "nope", json!({})).await;
    assert_eq!(unknown["ok"], false);
    assert_eq!(unknown["errorCode"], 400);

    assert_eq!(running.server.room_ids().await, vec!["lobby".to_string()]);

    client.close(None).await.unwrap();
    running.fake.wait_for("router.close", 1).await;

    running.shutdown.take().unwrap().send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(2), running.task)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn peers_in_the_same_room_see_each_other() {
    let running = start().await;
    let url = |peer: &str| format!("ws://{}/?roomId=lobby&peerId={peer}", running.addr);
    let (mut alice, _) = connect_async(url("alice")).await.unwrap();
    let (mut bob, _) = connect_async(url("bob")).await.unwrap();

    call(&mut alice, 1, "join", json!({"displayName": "Alice"})).await;
    let joined = call(&mut bob, 1, "join", json!({"displayName": "Bob"})).await;
    assert_eq!(joined["data"]["peers"][0]["id"], "alice");

    let new_peer = recv_json(&mut alice).await;
    assert_eq!(new_peer["notification"], true);
    assert_eq!(new_peer["method"], "newPeer");
    assert_eq!(new_peer["data"]["displayName"], "Bob");

    bob.close(None).await.unwrap();
    let closed = recv_json(&mut alice).await;
    assert_eq!(closed["method"], "peerClosed");
    assert_eq!(closed["data"]["peerId"], "bob");
    assert_eq!(running.fake.count("worker.createRouter"), 1);
}
