// Live telemetry feed adapter
//
// Wraps the steady-state WebSocket connection to the gateway. The adapter
// cycles Disconnected -> Connecting -> Connected -> Disconnected forever
// with a fixed 5 second delay between attempts: no backoff, no retry cap.
// Malformed text frames are logged and dropped without tearing the
// connection down.

use crate::domain::telemetry::TelemetryFrame;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Disconnected,
    Connecting,
    Connected,
}

/// Owner handle for the feed task. Consuming `close` makes the adapter
/// closable exactly once; a close during the reconnect sleep cancels the
/// pending attempt.
pub struct LiveFeedHandle {
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<FeedState>,
    task: JoinHandle<()>,
}

impl LiveFeedHandle {
    pub fn state(&self) -> FeedState {
        *self.state.borrow()
    }

    pub fn state_receiver(&self) -> watch::Receiver<FeedState> {
        self.state.clone()
    }

    pub async fn close(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!("live feed task ended abnormally: {e}");
        }
    }
}

/// Spawn the adapter. Parsed frames are forwarded through `frames`; the
/// task also stops if that receiver goes away.
pub fn spawn(url: String, frames: mpsc::Sender<TelemetryFrame>) -> LiveFeedHandle {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (state_tx, state_rx) = watch::channel(FeedState::Disconnected);
    let task = tokio::spawn(run(url, frames, shutdown_rx, state_tx));
    LiveFeedHandle {
        shutdown: shutdown_tx,
        state: state_rx,
        task,
    }
}

async fn run(
    url: String,
    frames: mpsc::Sender<TelemetryFrame>,
    mut shutdown: watch::Receiver<bool>,
    state: watch::Sender<FeedState>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }
        let _ = state.send(FeedState::Connecting);

        let attempt = tokio::select! {
            result = connect_async(url.as_str()) => result,
            _ = shutdown_requested(&mut shutdown) => {
                let _ = state.send(FeedState::Disconnected);
                return;
            }
        };

        match attempt {
            Ok((socket, _)) => {
                tracing::info!("live feed connected to {url}");
                let _ = state.send(FeedState::Connected);
                let (_, mut read) = socket.split();

                loop {
                    tokio::select! {
                        _ = shutdown_requested(&mut shutdown) => {
                            let _ = state.send(FeedState::Disconnected);
                            return;
                        }
                        message = read.next() => match message {
                            Some(Ok(Message::Text(text))) => {
                                match TelemetryFrame::parse(&text) {
                                    Ok(frame) => {
                                        if frames.send(frame).await.is_err() {
                                            let _ = state.send(FeedState::Disconnected);
                                            return;
                                        }
                                    }
                                    Err(e) => tracing::warn!("dropping unparseable frame: {e}"),
                                }
                            }
                            Some(Ok(_)) => {} // binary/ping/pong frames are ignored
                            Some(Err(e)) => {
                                tracing::warn!("live feed read error: {e}");
                                break;
                            }
                            None => break,
                        }
                    }
                }
                let _ = state.send(FeedState::Disconnected);
                tracing::warn!("live feed disconnected, reconnecting in {RECONNECT_DELAY:?}");
            }
            Err(e) => {
                let _ = state.send(FeedState::Disconnected);
                tracing::warn!("live feed connect failed: {e}, retrying in {RECONNECT_DELAY:?}");
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            _ = shutdown_requested(&mut shutdown) => return,
        }
    }
}

/// Resolves once shutdown is requested or the handle is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::SinkExt;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    #[tokio::test]
    async fn forwards_parsed_frames_and_drops_garbage() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut socket = accept_async(stream).await.unwrap();
            socket
                .send(Message::Text("definitely not json".into()))
                .await
                .unwrap();
            socket
                .send(Message::Text(
                    r#"{"donnees":[{"tag":"Tag_1001","valeur":7,"horodatage":"t"}]}"#.into(),
                ))
                .await
                .unwrap();
            // Hold the socket open until the client goes away.
            while socket.next().await.is_some() {}
        });

        let (tx, mut rx) = mpsc::channel(8);
        let handle = spawn(format!("ws://{addr}"), tx);

        let frame = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("feed closed");
        assert_eq!(frame.readings[0].tag, "Tag_1001");
        assert_eq!(handle.state(), FeedState::Connected);

        handle.close().await;
        server.abort();
    }

    #[tokio::test]
    async fn close_during_reconnect_wait_cancels_the_attempt() {
        // Nothing listens here, so the adapter fails fast and sits in its
        // 5 second reconnect sleep.
        let (tx, _rx) = mpsc::channel(1);
        let handle = spawn("ws://127.0.0.1:9".to_string(), tx);
        tokio::time::sleep(Duration::from_millis(200)).await;

        tokio::time::timeout(Duration::from_secs(2), handle.close())
            .await
            .expect("close did not cancel the pending reconnect");
    }
}
