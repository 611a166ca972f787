//! Static configuration, loaded once at startup.
//!
//! A settings file names every speaker the installation knows about (its
//! ranging sensor, its audio device, and its volume ramp thresholds), the
//! distance smoothing factor, and the endpoints of the two collaborators.

use crate::error::{Result, SoundfieldError};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Immutable per-speaker configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerConfig {
    /// Identifier of the ranging sensor paired to this speaker
    /// (e.g. a MAC address like "1A:2B:3C:4D:5E").
    pub sensor_id: String,

    /// Identifier of the playback device in the audio server's namespace.
    pub audio_device_id: String,

    /// Distance (mm) at or below which output volume is unattenuated.
    pub full_volume_distance: f64,

    /// Distance (mm) at or above which output volume is zero.
    pub mute_distance: f64,
}

/// Topic names the event link subscribes to and publishes on.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topics {
    /// Batched distance samples from the sensor network.
    #[serde(default = "default_distances_topic")]
    pub distances: String,

    /// Single distance sample.
    #[serde(default = "default_distance_topic")]
    pub distance: String,

    /// Speaker connect requests.
    #[serde(default = "default_connect_topic")]
    pub connect: String,

    /// Speaker disconnect requests.
    #[serde(default = "default_disconnect_topic")]
    pub disconnect: String,

    /// Base volume change requests.
    #[serde(default = "default_set_volume_topic")]
    pub set_volume: String,

    /// Outbound listener position reports.
    #[serde(default = "default_listener_position_topic")]
    pub listener_position: String,

    /// Outbound speaker placement reports.
    #[serde(default = "default_speaker_position_topic")]
    pub speaker_position: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            distances: default_distances_topic(),
            distance: default_distance_topic(),
            connect: default_connect_topic(),
            disconnect: default_disconnect_topic(),
            set_volume: default_set_volume_topic(),
            listener_position: default_listener_position_topic(),
            speaker_position: default_speaker_position_topic(),
        }
    }
}

fn default_distances_topic() -> String {
    "soundfield/sensor/distances".to_string()
}

fn default_distance_topic() -> String {
    "soundfield/sensor/distance".to_string()
}

fn default_connect_topic() -> String {
    "soundfield/speaker/connect".to_string()
}

fn default_disconnect_topic() -> String {
    "soundfield/speaker/disconnect".to_string()
}

fn default_set_volume_topic() -> String {
    "soundfield/speaker/volume".to_string()
}

fn default_listener_position_topic() -> String {
    "soundfield/listener/position".to_string()
}

fn default_speaker_position_topic() -> String {
    "soundfield/speaker/position".to_string()
}

fn default_smoothing_factor() -> f64 {
    0.3
}

fn default_broker_url() -> String {
    "ws://localhost:9001".to_string()
}

fn default_audio_server_url() -> String {
    "ws://localhost:1780/jsonrpc".to_string()
}

/// Complete engine settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Exponential-moving-average weight for new distance readings:
    /// `distance = new * alpha + distance * (1 - alpha)`.
    #[serde(default = "default_smoothing_factor")]
    pub smoothing_factor: f64,

    /// Every speaker the installation may connect.
    pub speakers: Vec<SpeakerConfig>,

    /// WebSocket endpoint of the event broker.
    #[serde(default = "default_broker_url")]
    pub broker_url: String,

    /// WebSocket endpoint of the audio server's JSON-RPC API.
    #[serde(default = "default_audio_server_url")]
    pub audio_server_url: String,

    #[serde(default)]
    pub topics: Topics,
}

impl Settings {
    /// Parse settings from a JSON string and validate the invariants.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Look up the configuration for a sensor id.
    pub fn speaker(&self, sensor_id: &str) -> Option<&SpeakerConfig> {
        self.speakers.iter().find(|s| s.sensor_id == sensor_id)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0 < self.smoothing_factor && self.smoothing_factor < 1.0) {
            return Err(SoundfieldError::Config(format!(
                "smoothing factor {} must be in (0, 1)",
                self.smoothing_factor
            )));
        }

        let mut seen = HashSet::new();
        for speaker in &self.speakers {
            if !(0.0 <= speaker.full_volume_distance
                && speaker.full_volume_distance < speaker.mute_distance)
            {
                return Err(SoundfieldError::Config(format!(
                    "speaker {}: need 0 <= fullVolumeDistance ({}) < muteDistance ({})",
                    speaker.sensor_id, speaker.full_volume_distance, speaker.mute_distance
                )));
            }
            if !seen.insert(speaker.sensor_id.as_str()) {
                return Err(SoundfieldError::Config(format!(
                    "duplicate sensor id {}",
                    speaker.sensor_id
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal(speakers: &str) -> String {
        format!(r#"{{ "speakers": {speakers} }}"#)
    }

    #[test]
    fn parses_with_defaults() {
        let settings = Settings::from_json(&minimal(
            r#"[{"sensorId": "aa:bb", "audioDeviceId": "dev-1",
                 "fullVolumeDistance": 1000, "muteDistance": 5000}]"#,
        ))
        .unwrap();

        assert_eq!(settings.smoothing_factor, 0.3);
        assert_eq!(settings.topics.distances, "soundfield/sensor/distances");
        assert_eq!(settings.speakers.len(), 1);
        assert_eq!(settings.speaker("aa:bb").unwrap().audio_device_id, "dev-1");
        assert!(settings.speaker("nope").is_none());
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let err = Settings::from_json(&minimal(
            r#"[{"sensorId": "aa:bb", "audioDeviceId": "dev-1",
                 "fullVolumeDistance": 5000, "muteDistance": 1000}]"#,
        ))
        .unwrap_err();
        assert!(matches!(err, SoundfieldError::Config(_)), "got {err:?}");
    }

    #[test]
    fn rejects_equal_thresholds() {
        assert!(Settings::from_json(&minimal(
            r#"[{"sensorId": "aa:bb", "audioDeviceId": "dev-1",
                 "fullVolumeDistance": 1000, "muteDistance": 1000}]"#,
        ))
        .is_err());
    }

    #[test]
    fn rejects_duplicate_sensor_ids() {
        let err = Settings::from_json(&minimal(
            r#"[{"sensorId": "aa:bb", "audioDeviceId": "dev-1",
                 "fullVolumeDistance": 0, "muteDistance": 1},
                {"sensorId": "aa:bb", "audioDeviceId": "dev-2",
                 "fullVolumeDistance": 0, "muteDistance": 1}]"#,
        ))
        .unwrap_err();
        assert!(matches!(err, SoundfieldError::Config(_)), "got {err:?}");
    }

    #[test]
    fn rejects_out_of_range_smoothing() {
        for alpha in ["0.0", "1.0", "-0.3", "2.5"] {
            let json = format!(r#"{{ "smoothingFactor": {alpha}, "speakers": [] }}"#);
            assert!(Settings::from_json(&json).is_err(), "alpha {alpha} accepted");
        }
    }

    #[test]
    fn honors_explicit_topics_and_endpoints() {
        let settings = Settings::from_json(
            r#"{
                "speakers": [],
                "brokerUrl": "ws://broker:9001",
                "audioServerUrl": "ws://audio:1780/jsonrpc",
                "topics": { "distances": "hall/ranges" }
            }"#,
        )
        .unwrap();
        assert_eq!(settings.broker_url, "ws://broker:9001");
        assert_eq!(settings.topics.distances, "hall/ranges");
        // Unspecified topics keep their defaults.
        assert_eq!(settings.topics.connect, "soundfield/speaker/connect");
    }
}
