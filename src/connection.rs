use crate::error::{Result, SoundfieldError};
use crate::protocol::{RpcRequest, RpcResponse};
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use uuid::Uuid;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection state shared with the reader task
struct ConnectionState {
    /// Pending requests waiting for responses
    pending_requests: HashMap<Uuid, oneshot::Sender<RpcResponse>>,
    /// Channel for sending outgoing messages
    ws_tx: mpsc::UnboundedSender<Message>,
}

/// Low-level JSON-RPC-over-WebSocket connection to the audio server.
///
/// Requests are matched to responses by id; the reader task resolves each
/// pending request as its response arrives, so any number of callers can
/// have requests in flight at once.
pub struct RpcConnection {
    state: Arc<Mutex<ConnectionState>>,
}

impl RpcConnection {
    /// Connect to a WebSocket URL
    pub async fn connect(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        tracing::info!("Connecting to audio server at {}", url);

        let (ws_stream, _) = connect_async(&url).await?;
        let (mut write, mut read) = ws_stream.split();

        let (ws_tx, mut ws_rx) = mpsc::unbounded_channel::<Message>();

        let state = Arc::new(Mutex::new(ConnectionState {
            pending_requests: HashMap::new(),
            ws_tx,
        }));

        // Forward outgoing messages to the socket
        let write_handle = tokio::spawn(async move {
            while let Some(msg) = ws_rx.recv().await {
                if let Err(e) = write.send(msg).await {
                    tracing::error!("Failed to send message: {}", e);
                    break;
                }
            }
        });

        // Receive and resolve incoming responses
        let state_clone = state.clone();
        tokio::spawn(async move {
            while let Some(msg_result) = read.next().await {
                match msg_result {
                    Ok(Message::Text(text)) => {
                        if let Err(e) = Self::handle_message(&state_clone, text).await {
                            tracing::error!("Error handling message: {}", e);
                        }
                    }
                    Ok(Message::Close(_)) => {
                        tracing::info!("Audio server connection closed");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }

            // Connection closed; dropping the senders fails every waiter.
            let mut state = state_clone.lock().await;
            state.pending_requests.clear();
            drop(write_handle);
        });

        Ok(Self { state })
    }

    /// Handle one incoming frame
    async fn handle_message(state: &Arc<Mutex<ConnectionState>>, text: String) -> Result<()> {
        tracing::debug!("Received: {}", text);

        let response: RpcResponse = serde_json::from_str(&text)?;

        match response.id {
            Some(id) => {
                let mut state = state.lock().await;
                if let Some(tx) = state.pending_requests.remove(&id) {
                    let _ = tx.send(response);
                } else {
                    tracing::debug!("Response for unknown request id {}", id);
                }
            }
            None => {
                // Server notification; the engine does not consume these.
                tracing::debug!("Ignoring server notification");
            }
        }

        Ok(())
    }

    /// Send a request and wait for the matching response
    pub async fn send_request(&self, request: RpcRequest) -> Result<RpcResponse> {
        let request_id = request.id;
        let (tx, rx) = oneshot::channel();

        // Register the pending request
        {
            let mut state = self.state.lock().await;
            state.pending_requests.insert(request_id, tx);

            let json = serde_json::to_string(&request)?;
            tracing::debug!("Sending: {}", json);

            state
                .ws_tx
                .send(Message::Text(json))
                .map_err(|_| SoundfieldError::ConnectionClosed)?;
        }

        // Wait for the response with a timeout
        let response = match timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(SoundfieldError::ConnectionClosed),
            Err(_) => {
                // Timed out; forget the pending request
                let mut state = self.state.lock().await;
                state.pending_requests.remove(&request_id);
                return Err(SoundfieldError::Timeout);
            }
        };

        if let Some(error) = response.error {
            return Err(SoundfieldError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        Ok(response)
    }
}
