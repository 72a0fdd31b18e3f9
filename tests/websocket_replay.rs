//! End-to-end websocket protocol tests, driven over a real TCP connection
//! against [`replayd::app::build_in_memory`] — no mocked transport.

use std::io::Write;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tempfile::NamedTempFile;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use replayd::config::{LoggingSettings, MetricsSettings, RedisSettings, Settings};

fn settings_for(upload_dir: &str) -> Settings {
    Settings {
        port: 0,
        redis: RedisSettings {
            network: "tcp".into(),
            address: "127.0.0.1:6379".into(),
            password: None,
        },
        production: false,
        concurrency_factor: 1,
        batch_size: 125,
        upload_dir: upload_dir.to_string(),
        logging: LoggingSettings {
            level: "info".into(),
            format: "pretty".into(),
            file_path: None,
        },
        metrics: MetricsSettings {
            enabled: false,
            host: "0.0.0.0".into(),
            port: 0,
        },
    }
}

async fn spawn_server() -> (String, tokio_util::sync::CancellationToken) {
    let settings = settings_for("replayd-test-uploads");
    let (router, cancel) = replayd::app::build_in_memory(&settings)
        .await
        .expect("build_in_memory should succeed");

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    (format!("ws://{addr}/v1/ws"), cancel)
}

async fn next_json(
    socket: &mut tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
) -> Value {
    let message = timeout(Duration::from_secs(2), socket.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("stream ended")
        .expect("websocket error");
    let Message::Text(text) = message else {
        panic!("expected a text frame, got {message:?}");
    };
    serde_json::from_str(&text.to_string()).expect("frame is valid JSON")
}

/// Scenario A — order replay, small file, fast rate: three trades in, three
/// data frames out in `seq` order, then one EOF frame.
#[tokio::test]
async fn order_replay_emits_trades_then_eof() {
    let mut file = NamedTempFile::new().expect("tempfile");
    writeln!(file, r#"{{"price":"100","quantity":1,"aggressor":"bid","timestamp":1000}}"#).unwrap();
    writeln!(file, r#"{{"price":"101","quantity":2,"aggressor":"ask","timestamp":1500}}"#).unwrap();
    writeln!(file, r#"{{"price":"102","quantity":3,"aggressor":"bid","timestamp":2000}}"#).unwrap();

    let (url, cancel) = spawn_server().await;
    let (mut socket, _) = tokio_tungstenite::connect_async(&url).await.expect("connect");

    let filename = file.path().to_str().unwrap().to_string();
    let subscribe = json!({
        "id": "",
        "filename": filename,
        "replay_rate": 1000.0,
        "name": "order",
        "granularity": 0,
        "type": "subscribe",
    });
    socket
        .send(Message::Text(subscribe.to_string().into()))
        .await
        .expect("send subscribe frame");

    let ack = next_json(&mut socket).await;
    assert_eq!(ack["code"], 1);

    let trade0 = next_json(&mut socket).await;
    assert_eq!(trade0["price"], "100");
    assert_eq!(trade0["aggressor"], "bid");

    let trade1 = next_json(&mut socket).await;
    assert_eq!(trade1["price"], "101");
    assert_eq!(trade1["aggressor"], "ask");

    let trade2 = next_json(&mut socket).await;
    assert_eq!(trade2["price"], "102");

    let eof = next_json(&mut socket).await;
    assert!(eof.get("request_id").is_some());
    assert!(eof.get("price").is_none());

    cancel.cancel();
}

/// An unparsable control frame gets a `{code:0, msg:"Bad Payload"}` ack and
/// the connection stays open for the next frame.
#[tokio::test]
async fn malformed_control_frame_gets_bad_payload_ack() {
    let (url, cancel) = spawn_server().await;
    let (mut socket, _) = tokio_tungstenite::connect_async(&url).await.expect("connect");

    socket
        .send(Message::Text("not json".to_string().into()))
        .await
        .expect("send garbage frame");

    let ack = next_json(&mut socket).await;
    assert_eq!(ack["code"], 0);
    assert_eq!(ack["msg"], "Bad Payload");

    cancel.cancel();
}

/// A well-formed but semantically invalid subscribe request (non-positive
/// `replay_rate`) must be rejected with the same `{code:0, msg:"Bad
/// Payload"}` ack as an unparsable frame — it must never get a success ack
/// and must never be wired into the broker.
#[tokio::test]
async fn invalid_subscribe_request_gets_bad_payload_ack() {
    let mut file = NamedTempFile::new().expect("tempfile");
    writeln!(file, r#"{{"price":"100","quantity":1,"aggressor":"bid","timestamp":1000}}"#).unwrap();

    let (url, cancel) = spawn_server().await;
    let (mut socket, _) = tokio_tungstenite::connect_async(&url).await.expect("connect");

    let filename = file.path().to_str().unwrap().to_string();
    let subscribe = json!({
        "id": "",
        "filename": filename,
        "replay_rate": -1.0,
        "name": "order",
        "granularity": 0,
        "type": "subscribe",
    });
    socket
        .send(Message::Text(subscribe.to_string().into()))
        .await
        .expect("send subscribe frame");

    let ack = next_json(&mut socket).await;
    assert_eq!(ack["code"], 0);
    assert_eq!(ack["msg"], "Bad Payload");

    cancel.cancel();
}

/// Unsubscribing an id the server never saw is a no-op: no ack, no crash,
/// connection stays usable.
#[tokio::test]
async fn unsubscribe_unknown_id_is_silently_ignored() {
    let (url, cancel) = spawn_server().await;
    let (mut socket, _) = tokio_tungstenite::connect_async(&url).await.expect("connect");

    let unsubscribe = json!({
        "id": "does-not-exist",
        "filename": "",
        "replay_rate": 0.0,
        "name": "order",
        "granularity": 0,
        "type": "unsubscribe",
    });
    socket
        .send(Message::Text(unsubscribe.to_string().into()))
        .await
        .expect("send unsubscribe frame");

    // Follow up with a malformed frame; if the unsubscribe had wedged the
    // connection we'd time out here instead of getting the bad-payload ack.
    socket
        .send(Message::Text("not json".to_string().into()))
        .await
        .expect("send garbage frame");
    let ack = next_json(&mut socket).await;
    assert_eq!(ack["code"], 0);

    cancel.cancel();
}
