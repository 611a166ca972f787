use crate::geometry::Vec3;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Broker frame: every message on the event link is a topic plus a JSON
/// payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub topic: String,
    pub data: Value,
}

impl Envelope {
    pub fn new(topic: impl Into<String>, data: Value) -> Self {
        Self {
            topic: topic.into(),
            data,
        }
    }
}

/// One range reading from the sensor network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceReport {
    /// Sensor identifier (MAC-style string)
    pub id: String,

    /// Measured distance in millimetres
    pub distance: f64,
}

/// A batch of range readings delivered in one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceBatch {
    pub distances: Vec<DistanceReport>,
}

/// Connect/disconnect request for one speaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerRequest {
    /// Sensor identifier of the speaker
    pub id: String,
}

/// Base-volume change request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeRequest {
    /// Sensor identifier of the speaker
    pub id: String,

    /// Requested base volume, 0.0 to 1.0
    pub volume: f64,
}

/// Outbound listener position report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerReport {
    pub position: Vec3,
}

/// Outbound speaker placement report, published when a speaker connects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerReport {
    /// Sensor identifier of the speaker
    pub id: String,
    pub position: Vec3,
}

/// JSON-RPC 2.0 request frame for the audio server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: Uuid,
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcRequest {
    /// Create a request for the given method with a fresh id.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params: None,
        }
    }

    /// Attach parameters.
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }
}

/// JSON-RPC 2.0 response frame. Server notifications carry no id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn distance_batch_decodes_from_wire_shape() {
        let batch: DistanceBatch = serde_json::from_value(json!({
            "distances": [
                {"id": "1A:2B:3C:4D:5E", "distance": 1234.5},
                {"id": "0F:00:11:22:33", "distance": 980.0}
            ]
        }))
        .unwrap();
        assert_eq!(batch.distances.len(), 2);
        assert_eq!(batch.distances[0].id, "1A:2B:3C:4D:5E");
        assert_eq!(batch.distances[1].distance, 980.0);
    }

    #[test]
    fn envelope_roundtrips() {
        let envelope = Envelope::new("soundfield/speaker/connect", json!({"id": "aa:bb"}));
        let text = serde_json::to_string(&envelope).unwrap();
        let back: Envelope = serde_json::from_str(&text).unwrap();
        assert_eq!(back.topic, "soundfield/speaker/connect");
        assert_eq!(back.data["id"], "aa:bb");
    }

    #[test]
    fn listener_report_serializes_position_fields() {
        let report = ListenerReport {
            position: Vec3::new(1.0, 2.5, -3.0),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json, json!({"position": {"x": 1.0, "y": 2.5, "z": -3.0}}));
    }

    #[test]
    fn rpc_request_carries_version_and_id() {
        let request = RpcRequest::new("Client.SetVolume").with_params(json!({"id": "dev"}));
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["method"], "Client.SetVolume");
        assert!(json["id"].is_string());
        assert_eq!(json["params"]["id"], "dev");
    }

    #[test]
    fn rpc_error_response_decodes() {
        let response: RpcResponse = serde_json::from_str(
            r#"{"id": "9f8b7c6d-1111-2222-3333-444455556666", "jsonrpc": "2.0",
                "error": {"code": -32601, "message": "method not found"}}"#,
        )
        .unwrap();
        assert!(response.result.is_none());
        let error = response.error.unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.message, "method not found");
    }

    #[test]
    fn rpc_notification_has_no_id() {
        let response: RpcResponse = serde_json::from_str(
            r#"{"jsonrpc": "2.0", "method": "Client.OnVolumeChanged", "params": {}}"#,
        )
        .unwrap();
        assert!(response.id.is_none());
    }
}
