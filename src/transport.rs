//! The event link: inbound commands and ranging data, outbound positions.
//!
//! Connects to the event broker over WebSocket, subscribes to the
//! configured topics, decodes each frame and dispatches it to the
//! [`Engine`]. Malformed payloads are logged and dropped here; the engine
//! never sees them. The link reconnects with exponential backoff if the
//! broker goes away.

use crate::config::Topics;
use crate::engine::{DistanceSample, Engine};
use crate::error::Result;
use crate::protocol::{
    DistanceBatch, DistanceReport, Envelope, ListenerReport, SpeakerRequest, SpeakerReport,
    VolumeRequest,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};

const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Topic of the control frame that subscribes this link to its inputs.
const SUBSCRIBE_TOPIC: &str = "subscribe";

/// Background link between the broker and the engine.
///
/// Runs until [`stop`](EventLink::stop) is called; connection loss is
/// handled internally with exponential backoff (1s doubling to 60s).
pub struct EventLink {
    engine: Arc<Engine>,
    stop_tx: Option<broadcast::Sender<()>>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl EventLink {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            stop_tx: None,
            task_handle: None,
        }
    }

    /// Start the link. If it is already running it is stopped and
    /// restarted.
    pub async fn start(&mut self) -> Result<()> {
        self.stop().await;

        let (stop_tx, _) = broadcast::channel(1);
        self.stop_tx = Some(stop_tx.clone());

        let engine = self.engine.clone();

        let handle = tokio::spawn(async move {
            let mut backoff = Duration::from_secs(0);
            let mut stop_rx = stop_tx.subscribe();

            loop {
                tokio::select! {
                    _ = stop_rx.recv() => {
                        tracing::info!("Event link stopped by user");
                        break;
                    }
                    _ = async {
                        if backoff > Duration::from_secs(0) {
                            tracing::info!("Reconnecting to event broker in {:?}", backoff);
                            sleep(backoff).await;
                        }

                        let mut stop_rx_inner = stop_tx.subscribe();
                        match run_link_once(&engine, &mut stop_rx_inner).await {
                            Ok(_) => {
                                backoff = Duration::from_secs(0);
                            }
                            Err(e) => {
                                tracing::error!("Event link error: {}", e);
                                if backoff == Duration::from_secs(0) {
                                    backoff = Duration::from_secs(1);
                                } else {
                                    backoff = (backoff * 2).min(MAX_BACKOFF);
                                }
                            }
                        }
                    } => {}
                }
            }
        });

        self.task_handle = Some(handle);
        Ok(())
    }

    /// Stop the link and close the broker connection.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.task_handle.take() {
            // Give it a moment to stop gracefully
            let _ = tokio::time::timeout(Duration::from_millis(500), handle).await;
        }
    }
}

/// One connection lifetime: subscribe, then read and dispatch frames until
/// the socket closes or a stop is requested.
async fn run_link_once(engine: &Arc<Engine>, stop_rx: &mut broadcast::Receiver<()>) -> Result<()> {
    let url = engine.settings().broker_url.clone();
    let topics = engine.settings().topics.clone();

    tracing::info!("Connecting to event broker at {}", url);
    let (ws_stream, _) = connect_async(&url).await?;
    let (mut write, mut read) = ws_stream.split();

    let subscription = Envelope::new(
        SUBSCRIBE_TOPIC,
        serde_json::json!([
            &topics.distances,
            &topics.distance,
            &topics.connect,
            &topics.disconnect,
            &topics.set_volume,
        ]),
    );
    write
        .send(Message::Text(serde_json::to_string(&subscription)?))
        .await?;

    loop {
        let msg_result = tokio::select! {
            _ = stop_rx.recv() => {
                tracing::info!("Event link cancelled, closing connection");
                let _ = write.close().await;
                return Ok(());
            }
            msg = read.next() => msg,
        };

        let Some(msg_result) = msg_result else {
            break;
        };

        match msg_result {
            Ok(Message::Text(text)) => {
                let envelope = match serde_json::from_str::<Envelope>(&text) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        tracing::warn!("Dropping malformed frame: {} in {}", e, text);
                        continue;
                    }
                };

                if let Some(outbound) = handle_event(engine, &topics, envelope).await {
                    match serde_json::to_string(&outbound) {
                        Ok(json) => {
                            // Publish failures are logged, never propagated.
                            if let Err(e) = write.send(Message::Text(json)).await {
                                tracing::warn!("Failed to publish to {}: {}", outbound.topic, e);
                            }
                        }
                        Err(e) => {
                            tracing::warn!("Failed to encode report for {}: {}", outbound.topic, e);
                        }
                    }
                }
            }
            Ok(Message::Close(_)) => {
                tracing::info!("Event broker closed the connection");
                break;
            }
            Err(e) => {
                tracing::error!("WebSocket error: {}", e);
                let _ = write.close().await;
                return Err(e.into());
            }
            _ => {}
        }
    }

    let _ = write.close().await;
    Ok(())
}

/// Dispatch one decoded frame to the engine by topic.
///
/// Returns an envelope to publish back to the broker when the frame
/// produced a new position (a connected speaker's placement, or a listener
/// fix from a distance batch). Engine-level rejections (unknown sensor,
/// invalid volume, insufficient data) are logged and swallowed; they are
/// recoverable by later events.
async fn handle_event(engine: &Engine, topics: &Topics, envelope: Envelope) -> Option<Envelope> {
    let topic = envelope.topic.as_str();

    if topic == topics.distances {
        let batch: DistanceBatch = decode(topic, envelope.data)?;
        let samples: Vec<DistanceSample> = batch
            .distances
            .into_iter()
            .map(|report| DistanceSample {
                sensor_id: report.id,
                distance: report.distance,
            })
            .collect();

        engine.update_distances(&samples).await;

        match engine.listener_position(&samples).await {
            Ok(position) => {
                let report = ListenerReport { position };
                return Some(Envelope::new(
                    topics.listener_position.clone(),
                    serde_json::to_value(report).ok()?,
                ));
            }
            Err(e) => {
                tracing::debug!("No listener fix from this batch: {}", e);
            }
        }
    } else if topic == topics.distance {
        let report: DistanceReport = decode(topic, envelope.data)?;
        if let Err(e) = engine.update_distance(&report.id, report.distance).await {
            tracing::warn!("Distance update rejected: {}", e);
        }
    } else if topic == topics.connect {
        let request: SpeakerRequest = decode(topic, envelope.data)?;
        match engine.connect_speaker(&request.id).await {
            Ok(state) => {
                let report = SpeakerReport {
                    id: request.id,
                    position: state.position,
                };
                return Some(Envelope::new(
                    topics.speaker_position.clone(),
                    serde_json::to_value(report).ok()?,
                ));
            }
            Err(e) => {
                tracing::warn!("Connect rejected: {}", e);
            }
        }
    } else if topic == topics.disconnect {
        let request: SpeakerRequest = decode(topic, envelope.data)?;
        if let Err(e) = engine.disconnect_speaker(&request.id).await {
            tracing::warn!("Disconnect failed: {}", e);
        }
    } else if topic == topics.set_volume {
        let request: VolumeRequest = decode(topic, envelope.data)?;
        if let Err(e) = engine.set_base_volume(&request.id, request.volume).await {
            tracing::warn!("Volume request rejected: {}", e);
        }
    } else {
        tracing::debug!("Ignoring frame on topic {}", topic);
    }

    None
}

/// Decode a payload, logging and dropping it on failure.
fn decode<T: serde::de::DeserializeOwned>(topic: &str, data: serde_json::Value) -> Option<T> {
    match serde_json::from_value(data) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Dropping malformed payload on {}: {}", topic, e);
            None
        }
    }
}
