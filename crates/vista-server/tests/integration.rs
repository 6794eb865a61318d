//! End-to-end tests against a live server using a real WebSocket client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tokio::time::{Instant, sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use vista_core::{Payload, ToolError};
use vista_plugins::builtin::default_registry;
use vista_plugins::{FnTool, ToolPlugin};
use vista_server::{ServerConfig, VistaServer};

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Counts `slow.nap` invocations and how many overlap.
#[derive(Default)]
struct NapCounter {
    calls: AtomicUsize,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl NapCounter {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct TestServer {
    url: String,
    addr: SocketAddr,
    server: Arc<VistaServer>,
    naps: Arc<NapCounter>,
}

/// Boot a test server with the built-in plugins plus `slow` (`nap`, `explode`).
async fn boot_server(config: ServerConfig) -> TestServer {
    let naps = Arc::new(NapCounter::default());
    let counter = Arc::clone(&naps);
    let mut registry = default_registry(true);
    registry.register(Arc::new(
        ToolPlugin::new("slow")
            .with_tool(FnTool::new("nap", move |payload: Payload| {
                let _ = counter.calls.fetch_add(1, Ordering::SeqCst);
                let running = counter.running.fetch_add(1, Ordering::SeqCst) + 1;
                let _ = counter.peak.fetch_max(running, Ordering::SeqCst);
                let ms = payload.get("nap_ms").and_then(Value::as_u64).unwrap_or(100);
                std::thread::sleep(Duration::from_millis(ms));
                let _ = counter.running.fetch_sub(1, Ordering::SeqCst);
                Ok(Value::Object(payload))
            }))
            .with_tool(FnTool::new("explode", |_| {
                Err(ToolError::failed("detector offline"))
            })),
    ));
    let server = Arc::new(VistaServer::new(config, Arc::new(registry)));
    let (addr, _handle) = server.listen().await.unwrap();
    TestServer {
        url: format!("ws://{addr}/ws"),
        addr,
        server,
        naps,
    }
}

async fn connect(url: &str) -> WsStream {
    let (ws, _) = timeout(TIMEOUT, connect_async(url)).await.unwrap().unwrap();
    ws
}

async fn send(ws: &mut WsStream, frame: Value) {
    ws.send(Message::Text(frame.to_string().into())).await.unwrap();
}

/// Next text message as JSON, skipping control frames.
async fn recv(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next()).await.unwrap().unwrap().unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

fn naps(frame_id: &str, count: usize, nap_ms: u64) -> Value {
    json!({
        "type": "frame",
        "frame_id": frame_id,
        "plugin_id": "slow",
        "tools": vec!["nap"; count],
        "nap_ms": nap_ms
    })
}

/// Wait until `cond` holds, failing after [`TIMEOUT`].
async fn eventually(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + TIMEOUT;
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn frame_result_has_frame_id_and_no_steps() {
    let ts = boot_server(ServerConfig::default()).await;
    let mut ws = connect(&ts.url).await;

    send(
        &mut ws,
        json!({
            "type": "frame",
            "frame_id": "f-1",
            "image_data": "aGVsbG8=",
            "plugin_id": "frame",
            "tools": ["decode", "checksum", "strip_image"]
        }),
    )
    .await;
    let reply = recv(&mut ws).await;
    assert_eq!(reply["frame_id"], "f-1");
    assert_eq!(reply["result"]["frame_id"], "f-1");
    assert_eq!(reply["result"]["byte_len"], 5);
    assert!(reply["result"]["sha256"].is_string());
    assert!(reply["result"].get("image_data").is_none());
    assert!(reply.get("steps").is_none());
}

#[tokio::test]
async fn missing_tools_gets_error_frame_and_connection_survives() {
    let ts = boot_server(ServerConfig::default()).await;
    let mut ws = connect(&ts.url).await;

    send(
        &mut ws,
        json!({"type": "frame", "frame_id": "f-bad", "image_data": "aGk=", "plugin_id": "frame"}),
    )
    .await;
    let err = recv(&mut ws).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["frame_id"], "f-bad");
    assert!(err["message"].as_str().unwrap().contains("tools"));

    send(
        &mut ws,
        json!({"type": "frame", "frame_id": "f-good", "image_data": "aGk=", "plugin_id": "frame", "tools": ["decode"]}),
    )
    .await;
    let ok = recv(&mut ws).await;
    assert_eq!(ok["frame_id"], "f-good");
    assert_eq!(ok["result"]["byte_len"], 2);
}

#[tokio::test]
async fn every_failure_is_an_error_frame() {
    let ts = boot_server(ServerConfig::default()).await;
    let mut ws = connect(&ts.url).await;

    ws.send(Message::Text("{not json".into())).await.unwrap();
    let malformed = recv(&mut ws).await;
    assert_eq!(malformed["type"], "error");

    send(&mut ws, json!({"type": "hello", "frame_id": "f-t"})).await;
    let unknown_type = recv(&mut ws).await;
    assert_eq!(unknown_type["frame_id"], "f-t");

    send(
        &mut ws,
        json!({"type": "frame", "frame_id": "f-v", "plugin_id": "frame", "tools": ["ghost"]}),
    )
    .await;
    let invalid = recv(&mut ws).await;
    assert_eq!(invalid["code"], "INVALID_PIPELINE");

    send(
        &mut ws,
        json!({"type": "frame", "frame_id": "f-x", "plugin_id": "slow", "tools": ["explode"]}),
    )
    .await;
    let failed = recv(&mut ws).await;
    assert_eq!(failed["frame_id"], "f-x");
    assert_eq!(failed["code"], "TOOL_FAILED");
    assert!(failed["message"].as_str().unwrap().contains("detector offline"));
}

#[tokio::test]
async fn frame_timeout_stops_between_steps() {
    let config = ServerConfig {
        frame_timeout: Some(Duration::from_millis(50)),
        ..ServerConfig::default()
    };
    let ts = boot_server(config).await;
    let mut ws = connect(&ts.url).await;

    send(
        &mut ws,
        json!({"type": "frame", "frame_id": "f-slow", "plugin_id": "slow", "tools": ["nap", "nap"], "nap_ms": 150}),
    )
    .await;
    let reply = recv(&mut ws).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["code"], "PIPELINE_TIMEOUT");
    assert_eq!(reply["frame_id"], "f-slow");
}

#[tokio::test]
async fn concurrent_frames_correlate_by_frame_id() {
    let ts = boot_server(ServerConfig::default()).await;
    let mut ws = connect(&ts.url).await;

    send(
        &mut ws,
        json!({"type": "frame", "frame_id": "slow", "plugin_id": "slow", "tools": ["nap"], "nap_ms": 400}),
    )
    .await;
    send(
        &mut ws,
        json!({"type": "frame", "frame_id": "fast", "plugin_id": "debug", "tools": ["echo"]}),
    )
    .await;

    let first = recv(&mut ws).await;
    let second = recv(&mut ws).await;
    assert_eq!(first["frame_id"], "fast");
    assert_eq!(second["frame_id"], "slow");
}

#[tokio::test]
async fn health_counts_connections() {
    let ts = boot_server(ServerConfig::default()).await;
    let server = &ts.server;
    assert_eq!(server.connection_count(), 0);

    let mut ws = connect(&ts.url).await;
    // a round trip guarantees the server side has registered the connection
    send(
        &mut ws,
        json!({"type": "frame", "frame_id": "f", "plugin_id": "debug", "tools": ["echo"]}),
    )
    .await;
    let _ = recv(&mut ws).await;
    assert_eq!(server.connection_count(), 1);

    ws.close(None).await.unwrap();
    eventually("connection release", || server.connection_count() == 0).await;
}

#[tokio::test]
async fn shutdown_closes_connections() {
    let ts = boot_server(ServerConfig::default()).await;
    let mut ws = connect(&ts.url).await;
    send(
        &mut ws,
        json!({"type": "frame", "frame_id": "f", "plugin_id": "debug", "tools": ["echo"]}),
    )
    .await;
    let _ = recv(&mut ws).await;

    ts.server.shutdown().shutdown();
    let closed = timeout(TIMEOUT, async {
        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => return true,
                Ok(_) => {}
            }
        }
        true
    })
    .await
    .unwrap();
    assert!(closed);
}

#[tokio::test]
async fn disconnect_cancels_running_and_queued_frames() {
    let config = ServerConfig {
        max_frames_in_flight: 1,
        frame_timeout: None,
        ..ServerConfig::default()
    };
    let ts = boot_server(config).await;
    let mut ws = connect(&ts.url).await;

    send(&mut ws, naps("long", 10, 100)).await;
    send(&mut ws, naps("queued", 3, 100)).await;
    sleep(Duration::from_millis(150)).await;
    ws.close(None).await.unwrap();
    drop(ws);

    eventually("connection release", || ts.server.connection_count() == 0).await;
    let at_disconnect = ts.naps.calls();
    sleep(Duration::from_millis(600)).await;
    // the step running at disconnect may finish, nothing after it starts
    assert!(
        ts.naps.calls() <= at_disconnect + 1,
        "naps at disconnect={at_disconnect} total={}",
        ts.naps.calls()
    );
}

#[tokio::test]
async fn frames_in_flight_are_bounded() {
    let config = ServerConfig {
        max_frames_in_flight: 2,
        frame_timeout: None,
        ..ServerConfig::default()
    };
    let ts = boot_server(config).await;
    let mut ws = connect(&ts.url).await;

    for i in 0..5 {
        send(&mut ws, naps(&format!("f-{i}"), 1, 150)).await;
    }
    let mut ids = Vec::new();
    for _ in 0..5 {
        let reply = recv(&mut ws).await;
        assert!(reply.get("result").is_some(), "unexpected reply: {reply}");
        ids.push(reply["frame_id"].as_str().unwrap().to_owned());
    }
    ids.sort();
    assert_eq!(ids, vec!["f-0", "f-1", "f-2", "f-3", "f-4"]);
    assert_eq!(ts.naps.calls(), 5);
    assert!(ts.naps.peak() <= 2, "peak concurrency {}", ts.naps.peak());
}

#[tokio::test]
async fn queued_frames_do_not_starve_heartbeat() {
    let config = ServerConfig {
        heartbeat_interval_secs: 1,
        max_frames_in_flight: 1,
        frame_timeout: None,
        ..ServerConfig::default()
    };
    let ts = boot_server(config).await;
    let mut ws = connect(&ts.url).await;

    // ~3s of work behind one slot, longer than the 2s pong timeout
    send(&mut ws, naps("first", 3, 1_000)).await;
    send(&mut ws, naps("second", 1, 100)).await;

    let first = recv(&mut ws).await;
    let second = recv(&mut ws).await;
    assert_eq!(first["frame_id"], "first");
    assert_eq!(second["frame_id"], "second");
    assert_eq!(ts.naps.calls(), 4);
    assert_eq!(ts.server.connection_count(), 1);
}

#[tokio::test]
async fn silent_client_is_dropped_and_its_frames_cancelled() {
    let config = ServerConfig {
        heartbeat_interval_secs: 1,
        frame_timeout: None,
        ..ServerConfig::default()
    };
    let ts = boot_server(config).await;
    let mut ws = connect(&ts.url).await;
    send(&mut ws, naps("ignored", 20, 250)).await;

    // never read, so pings go unanswered
    let started = Instant::now();
    eventually("first nap", || ts.naps.calls() >= 1).await;
    eventually("liveness close", || ts.server.connection_count() == 0).await;
    assert!(started.elapsed() >= Duration::from_secs(2));

    let at_close = ts.naps.calls();
    sleep(Duration::from_millis(600)).await;
    assert!(ts.naps.calls() <= at_close + 1);
    assert!(ts.naps.calls() < 20);
}

#[tokio::test]
async fn dropped_rest_request_cancels_run() {
    let ts = boot_server(ServerConfig::default()).await;
    let body = json!({
        "plugin_id": "slow",
        "tools": vec!["nap"; 10],
        "payload": {"nap_ms": 100}
    })
    .to_string();
    let request = format!(
        "POST /pipeline HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\nContent-Length: {len}\r\n\r\n{body}",
        addr = ts.addr,
        len = body.len(),
    );

    let mut stream = tokio::net::TcpStream::connect(ts.addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    eventually("first nap", || ts.naps.calls() >= 1).await;
    sleep(Duration::from_millis(150)).await;
    drop(stream);

    let at_drop = ts.naps.calls();
    sleep(Duration::from_millis(600)).await;
    assert!(
        ts.naps.calls() <= at_drop + 1,
        "naps at drop={at_drop} total={}",
        ts.naps.calls()
    );
    assert!(ts.naps.calls() < 10);
}
