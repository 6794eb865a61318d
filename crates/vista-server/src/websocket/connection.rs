//! Lifecycle of one WebSocket connection, from upgrade to disconnect.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;
use vista_pipeline::{ExecutionOptions, PipelineEngine};

use super::frame::{ErrorFrame, FrameJob, ResultFrame, parse_frame, to_text};
use crate::server::AppState;

/// Outbound messages buffered per connection.
const OUTBOUND_QUEUE: usize = 256;

/// Liveness of the remote end, refreshed by every inbound message.
#[derive(Debug)]
pub struct Liveness {
    last_seen: Mutex<Instant>,
}

impl Default for Liveness {
    fn default() -> Self {
        Self {
            last_seen: Mutex::new(Instant::now()),
        }
    }
}

impl Liveness {
    /// Record activity.
    pub fn mark_alive(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    /// Time since the last activity.
    pub fn idle(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }
}

/// Keeps the open-connection counter accurate however the connection ends.
struct ConnectionGuard(Arc<AtomicUsize>);

impl ConnectionGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        let _ = counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let _ = self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Serve one connection until the client leaves, goes silent, or the server
/// shuts down.
///
/// Frames run concurrently, at most `max_frames_in_flight` at a time, and
/// replies are sent as each run finishes. Frames beyond that limit queue for
/// a slot while the socket keeps being read, so a disconnect is noticed at
/// once and cancels every queued or running frame of this connection.
pub async fn run_connection(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::now_v7();
    let span = info_span!("ws.connection", %connection_id);
    serve(socket, state).instrument(span).await;
}

async fn serve(socket: WebSocket, state: AppState) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.connections));
    let started = Instant::now();
    info!("client connected");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (send_tx, mut send_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);
    let cancel = state.shutdown.child_token();
    let liveness = Arc::new(Liveness::default());

    // Writer: replies out, periodic pings, close on cancel or silence.
    let writer_cancel = cancel.clone();
    let writer_liveness = Arc::clone(&liveness);
    let heartbeat = state.config.heartbeat_interval();
    let pong_timeout = state.config.pong_timeout();
    let writer = tokio::spawn(
        async move {
            let mut ping_interval = tokio::time::interval(heartbeat);
            // skip the immediate first tick
            let _ = ping_interval.tick().await;

            loop {
                tokio::select! {
                    msg = send_rx.recv() => {
                        let Some(text) = msg else { break };
                        if ws_tx.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    _ = ping_interval.tick() => {
                        if writer_liveness.idle() > pong_timeout {
                            warn!(idle_secs = writer_liveness.idle().as_secs(), "client unresponsive, disconnecting");
                            break;
                        }
                        if ws_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                            break;
                        }
                    }
                    () = writer_cancel.cancelled() => {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            writer_cancel.cancel();
        }
        .in_current_span(),
    );

    // Reader: parse frames and dispatch runs.
    let semaphore = Arc::new(Semaphore::new(state.config.max_frames_in_flight.max(1)));
    let frame_timeout = state.config.frame_timeout;
    let mut runs = JoinSet::new();
    let mut frames: u64 = 0;

    loop {
        let msg = tokio::select! {
            msg = ws_rx.next() => msg,
            Some(_) = runs.join_next(), if !runs.is_empty() => continue,
            () = cancel.cancelled() => break,
        };
        let Some(Ok(msg)) = msg else { break };
        liveness.mark_alive();

        let text = match msg {
            Message::Text(t) => t.as_str().to_owned(),
            Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = send_tx
                        .send(to_text(&ErrorFrame::new("", "binary frames must be UTF-8 JSON")))
                        .await;
                    continue;
                }
            },
            Message::Close(_) => {
                debug!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        let job = match parse_frame(&text) {
            Ok(job) => job,
            Err(reply) => {
                debug!(frame_id = %reply.frame_id, message = %reply.message, "frame rejected");
                let _ = send_tx.send(to_text(&reply)).await;
                continue;
            }
        };

        frames += 1;
        let frame_cancel = cancel.child_token();
        // the deadline runs from arrival, so time spent queued counts
        let options = ExecutionOptions::new()
            .with_cancel(frame_cancel.clone())
            .with_timeout(frame_timeout)
            .without_steps();
        let engine = state.engine.clone();
        let slots = Arc::clone(&semaphore);
        let reply_tx = send_tx.clone();
        let _ = runs.spawn(
            async move {
                let permit = tokio::select! {
                    permit = slots.acquire_owned() => match permit {
                        Ok(p) => p,
                        Err(_) => return,
                    },
                    () = frame_cancel.cancelled() => return,
                };
                let reply = run_frame(engine, job, options).await;
                drop(permit);
                let _ = reply_tx.send(reply).await;
            }
            .in_current_span(),
        );
    }

    cancel.cancel();
    runs.shutdown().await;
    drop(send_tx);
    let _ = writer.await;

    info!(
        frames,
        duration_secs = started.elapsed().as_secs(),
        "client disconnected"
    );
}

/// Run one frame's pipeline on the blocking pool and build the reply.
async fn run_frame(engine: PipelineEngine, job: FrameJob, options: ExecutionOptions) -> String {
    let FrameJob { frame_id, request } = job;
    let span = tracing::Span::current();
    let outcome =
        tokio::task::spawn_blocking(move || span.in_scope(|| engine.run(request, &options))).await;

    match outcome {
        Ok(Ok(result)) => to_text(&ResultFrame {
            frame_id,
            result: result.result,
        }),
        Ok(Err(e)) => to_text(&ErrorFrame::from_pipeline(frame_id, &e)),
        Err(join) => {
            warn!(error = %join, "frame worker failed");
            to_text(&ErrorFrame::new(frame_id, "internal error"))
        }
    }
}
