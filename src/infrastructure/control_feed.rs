// Control channel: one-shot history backfill, threshold pushes both ways
//
// Unlike the live feed this channel is request/response shaped. The
// backfill connects, asks for the dataset, takes exactly one response and
// closes; a 5 second connect timeout surfaces as an error without retry.

use crate::domain::telemetry::TelemetryFrame;
use crate::domain::threshold::ThresholdPatch;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum ControlFeedError {
    #[error("connection timeout, server might be unavailable")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("connection closed before a response arrived")]
    ClosedEarly,
    #[error("malformed control payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ControlRequest {
    GetHistory,
    UpdateThresholds {
        payload: HashMap<String, ThresholdPatch>,
    },
}

/// Messages the gateway pushes on this channel.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlPush {
    ThresholdUpdate {
        payload: HashMap<String, ThresholdPatch>,
    },
}

/// Fetch the full historical dataset, once per session.
pub async fn fetch_history(url: &str) -> Result<Vec<TelemetryFrame>, ControlFeedError> {
    let (socket, _) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(url))
        .await
        .map_err(|_| ControlFeedError::Timeout)??;
    let (mut write, mut read) = socket.split();

    let request = serde_json::to_string(&ControlRequest::GetHistory)?;
    write.send(Message::Text(request)).await?;

    while let Some(message) = read.next().await {
        match message? {
            Message::Text(text) => {
                let frames: Vec<TelemetryFrame> = serde_json::from_str(&text)?;
                let _ = write.send(Message::Close(None)).await;
                return Ok(frames);
            }
            _ => continue,
        }
    }
    Err(ControlFeedError::ClosedEarly)
}

/// Forward a user threshold save to the gateway.
pub async fn push_thresholds(
    url: &str,
    payload: HashMap<String, ThresholdPatch>,
) -> Result<(), ControlFeedError> {
    let (socket, _) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(url))
        .await
        .map_err(|_| ControlFeedError::Timeout)??;
    let (mut write, _) = socket.split();

    let request = serde_json::to_string(&ControlRequest::UpdateThresholds { payload })?;
    write.send(Message::Text(request)).await?;
    let _ = write.send(Message::Close(None)).await;
    Ok(())
}

/// Listen for asynchronous `threshold_update` pushes. One connection per
/// session, no reconnect; messages that are not threshold updates are
/// skipped.
pub fn spawn_threshold_listener(
    url: String,
    patches: mpsc::Sender<HashMap<String, ThresholdPatch>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let socket = match connect_async(url.as_str()).await {
            Ok((socket, _)) => socket,
            Err(e) => {
                tracing::warn!("threshold push channel unavailable: {e}");
                return;
            }
        };
        let (_, mut read) = socket.split();

        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Text(text)) => match serde_json::from_str::<ControlPush>(&text) {
                    Ok(ControlPush::ThresholdUpdate { payload }) => {
                        if patches.send(payload).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => tracing::debug!("ignoring control message: {e}"),
                },
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("threshold push channel error: {e}");
                    return;
                }
            }
        }
    })
}
