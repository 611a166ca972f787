//! The audio-volume collaborator.
//!
//! The engine only needs two operations from the audio server: set a
//! device's volume and read it back. [`VolumeControl`] is that seam;
//! [`AudioRpcClient`] implements it against the server's JSON-RPC API.
//! Failures are surfaced to the engine, which logs and keeps its local
//! state; retry policy belongs to whoever owns the connection.

use crate::connection::RpcConnection;
use crate::error::Result;
use crate::protocol::RpcRequest;
use async_trait::async_trait;
use serde_json::{json, Value};

/// Per-device volume control exposed by the audio server.
#[async_trait]
pub trait VolumeControl: Send + Sync {
    /// Set a device's playback volume to an integer percentage.
    async fn set_device_volume(&self, device_id: &str, percent: u8) -> Result<()>;

    /// Read a device's current volume as a fraction in `[0, 1]`.
    /// `None` means the server does not know the device.
    async fn device_volume(&self, device_id: &str) -> Result<Option<f64>>;
}

/// JSON-RPC client for the audio server's volume API.
pub struct AudioRpcClient {
    connection: RpcConnection,
}

impl AudioRpcClient {
    /// Connect to the audio server's WebSocket JSON-RPC endpoint.
    pub async fn connect(url: impl Into<String>) -> Result<Self> {
        let connection = RpcConnection::connect(url).await?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl VolumeControl for AudioRpcClient {
    async fn set_device_volume(&self, device_id: &str, percent: u8) -> Result<()> {
        tracing::trace!(device = %device_id, percent, "setting device volume");

        let request = RpcRequest::new("Client.SetVolume").with_params(json!({
            "id": device_id,
            "volume": {
                "muted": false,
                "percent": percent,
            },
        }));

        self.connection.send_request(request).await?;
        Ok(())
    }

    async fn device_volume(&self, device_id: &str) -> Result<Option<f64>> {
        tracing::trace!(device = %device_id, "reading device volume");

        let request = RpcRequest::new("Server.GetStatus");
        let response = self.connection.send_request(request).await?;

        Ok(response
            .result
            .as_ref()
            .and_then(|status| client_volume_from_status(status, device_id)))
    }
}

/// Dig a client's volume out of a `Server.GetStatus` result.
///
/// Clients live under `server.groups[].clients[]`; a muted client reads as
/// 0.0 and an absent one as unknown.
fn client_volume_from_status(status: &Value, device_id: &str) -> Option<f64> {
    let groups = status.get("server")?.get("groups")?.as_array()?;

    for group in groups {
        let Some(clients) = group.get("clients").and_then(|c| c.as_array()) else {
            continue;
        };
        for client in clients {
            if client.get("id").and_then(|v| v.as_str()) != Some(device_id) {
                continue;
            }
            let volume = client.get("config")?.get("volume")?;
            let muted = volume.get("muted").and_then(|v| v.as_bool()).unwrap_or(false);
            let percent = volume.get("percent").and_then(|v| v.as_f64())?;
            return Some(if muted { 0.0 } else { percent / 100.0 });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status() -> Value {
        json!({
            "server": {
                "groups": [
                    {
                        "clients": [
                            {
                                "id": "hall-left",
                                "config": {"volume": {"muted": false, "percent": 73}}
                            },
                            {
                                "id": "hall-right",
                                "config": {"volume": {"muted": true, "percent": 40}}
                            }
                        ]
                    },
                    {
                        "clients": [
                            {
                                "id": "lobby",
                                "config": {"volume": {"muted": false, "percent": 100}}
                            }
                        ]
                    }
                ]
            }
        })
    }

    #[test]
    fn finds_client_volume_across_groups() {
        assert_eq!(client_volume_from_status(&status(), "hall-left"), Some(0.73));
        assert_eq!(client_volume_from_status(&status(), "lobby"), Some(1.0));
    }

    #[test]
    fn muted_client_reads_as_zero() {
        assert_eq!(client_volume_from_status(&status(), "hall-right"), Some(0.0));
    }

    #[test]
    fn unknown_client_reads_as_none() {
        assert_eq!(client_volume_from_status(&status(), "attic"), None);
    }

    #[test]
    fn malformed_status_reads_as_none() {
        assert_eq!(client_volume_from_status(&json!({}), "hall-left"), None);
        assert_eq!(
            client_volume_from_status(&json!({"server": {"groups": [{}]}}), "hall-left"),
            None
        );
    }
}
