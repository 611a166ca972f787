//! Speaker registry and lifecycle controller.
//!
//! The [`Engine`] owns all mutable speaker state. Every mutation
//! (connect, distance update, base-volume change, disconnect) serializes on
//! one async mutex, so handlers running on separate tasks can never
//! interleave mid-operation. Volume pushes to the audio server are the one
//! exception: distance-driven pushes go through a per-speaker pusher task
//! that awaits each call before issuing the next and coalesces intermediate
//! values to the latest one, keeping device commands in order without
//! holding the registry lock across sensor-rate I/O.

use crate::audio::VolumeControl;
use crate::config::{Settings, SpeakerConfig};
use crate::error::{Result, SoundfieldError};
use crate::geometry::{centroid, Sphere, Vec3};
use crate::{placement, solver, volume};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// One decoded range reading: which sensor, how far (mm).
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceSample {
    pub sensor_id: String,
    pub distance: f64,
}

/// Runtime state of a connected speaker.
///
/// `position` is assigned once at connect time and never moves for the
/// lifetime of the connection; `distance` is the exponentially smoothed
/// range its sensor last reported.
#[derive(Debug, Clone)]
pub struct SpeakerState {
    pub config: SpeakerConfig,
    pub distance: f64,
    pub position: Vec3,
    pub base_volume: f64,
}

impl SpeakerState {
    fn output_percent(&self) -> u8 {
        volume::output_percent(
            self.distance,
            self.config.full_volume_distance,
            self.config.mute_distance,
            self.base_volume,
        )
    }
}

/// Per-speaker push task: awaits each device call before the next, keeping
/// the latest value when updates arrive faster than the server answers.
struct VolumePusher {
    tx: watch::Sender<u8>,
    task: JoinHandle<()>,
}

impl VolumePusher {
    fn spawn(audio: Arc<dyn VolumeControl>, device_id: String, current: u8) -> Self {
        let (tx, mut rx) = watch::channel(current);
        let task = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let percent = *rx.borrow_and_update();
                if let Err(e) = audio.set_device_volume(&device_id, percent).await {
                    tracing::warn!(device = %device_id, "volume push failed: {e}");
                }
            }
        });
        Self { tx, task }
    }

    fn push(&self, percent: u8) {
        let _ = self.tx.send(percent);
    }

    fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for VolumePusher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct Entry {
    state: SpeakerState,
    pusher: VolumePusher,
}

#[derive(Default)]
struct Registry {
    entries: HashMap<String, Entry>,
    /// Sensor ids in connection order; the bootstrap rules care which
    /// speakers were first, second and third.
    order: Vec<String>,
}

impl Registry {
    /// Coordinate for the next speaker to connect, derived from the
    /// already-placed speakers' positions and their current smoothed
    /// ranges (the ranging tag sits at the new speaker during setup).
    fn next_position(&self) -> Vec3 {
        let placed: Vec<&SpeakerState> = self
            .order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|e| &e.state)
            .collect();

        match placed.as_slice() {
            [] => placement::first(),
            [s] => placement::second(s.position, s.distance),
            [s1, s2] => placement::third(s1.position, s2.position, s1.distance, s2.distance),
            all => {
                let spheres: Vec<Sphere> = all
                    .iter()
                    .map(|s| Sphere::new(s.position, s.distance))
                    .collect();
                solver::solve(&spheres, centroid(all.iter().map(|s| s.position)))
            }
        }
    }
}

/// The position-estimation and volume-modulation engine.
///
/// Cheap to share: wrap it in an [`Arc`] and hand clones to every event
/// handler.
pub struct Engine {
    settings: Settings,
    audio: Arc<dyn VolumeControl>,
    registry: Mutex<Registry>,
}

impl Engine {
    pub fn new(settings: Settings, audio: Arc<dyn VolumeControl>) -> Self {
        Self {
            settings,
            audio,
            registry: Mutex::new(Registry::default()),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Bring a configured speaker online: assign its position, adopt the
    /// device's current volume as the base volume (1.0 when unavailable),
    /// and push the initial output volume.
    ///
    /// Connecting an already-connected speaker is a no-op that returns the
    /// existing state.
    pub async fn connect_speaker(&self, sensor_id: &str) -> Result<SpeakerState> {
        let mut registry = self.registry.lock().await;

        if let Some(entry) = registry.entries.get(sensor_id) {
            tracing::warn!(sensor = %sensor_id, "speaker is already connected");
            return Ok(entry.state.clone());
        }

        let config = self
            .settings
            .speaker(sensor_id)
            .ok_or_else(|| SoundfieldError::UnknownSpeaker(sensor_id.to_string()))?
            .clone();

        let position = registry.next_position();

        let base_volume = match self.audio.device_volume(&config.audio_device_id).await {
            Ok(Some(v)) => v,
            Ok(None) => 1.0,
            Err(e) => {
                tracing::warn!(
                    device = %config.audio_device_id,
                    "could not read device volume, assuming full: {e}"
                );
                1.0
            }
        };

        let state = SpeakerState {
            config,
            distance: 0.0,
            position,
            base_volume,
        };

        let percent = state.output_percent();
        if let Err(e) = self
            .audio
            .set_device_volume(&state.config.audio_device_id, percent)
            .await
        {
            tracing::warn!(
                device = %state.config.audio_device_id,
                "initial volume push failed: {e}"
            );
        }

        tracing::info!(
            sensor = %sensor_id,
            x = position.x,
            y = position.y,
            z = position.z,
            "speaker connected"
        );

        let pusher = VolumePusher::spawn(
            self.audio.clone(),
            state.config.audio_device_id.clone(),
            percent,
        );
        registry.order.push(sensor_id.to_string());
        registry.entries.insert(
            sensor_id.to_string(),
            Entry {
                state: state.clone(),
                pusher,
            },
        );

        Ok(state)
    }

    /// Take a speaker offline: silence its device, then drop its state.
    ///
    /// The zero push supersedes any in-flight pusher call and must
    /// complete or fail before the entry is removed; a stale background
    /// completion could otherwise re-enable volume on the device.
    /// Disconnecting a speaker that is not connected is logged, not an
    /// error.
    pub async fn disconnect_speaker(&self, sensor_id: &str) -> Result<()> {
        let mut registry = self.registry.lock().await;

        let Some(entry) = registry.entries.get(sensor_id) else {
            tracing::warn!(sensor = %sensor_id, "disconnect for a speaker that is not connected");
            return Ok(());
        };

        entry.pusher.cancel();
        if let Err(e) = self
            .audio
            .set_device_volume(&entry.state.config.audio_device_id, 0)
            .await
        {
            tracing::warn!(
                device = %entry.state.config.audio_device_id,
                "final mute push failed: {e}"
            );
        }

        registry.entries.remove(sensor_id);
        registry.order.retain(|id| id != sensor_id);
        tracing::info!(sensor = %sensor_id, "speaker disconnected");
        Ok(())
    }

    /// Fold a raw range reading into the speaker's smoothed distance and
    /// queue the resulting output volume for push.
    pub async fn update_distance(&self, sensor_id: &str, raw_distance: f64) -> Result<()> {
        let alpha = self.settings.smoothing_factor;
        let mut registry = self.registry.lock().await;

        let entry = registry
            .entries
            .get_mut(sensor_id)
            .ok_or_else(|| SoundfieldError::UnknownSpeaker(sensor_id.to_string()))?;

        entry.state.distance = raw_distance * alpha + entry.state.distance * (1.0 - alpha);
        entry.pusher.push(entry.state.output_percent());
        Ok(())
    }

    /// Apply a batch of range readings. Samples for unknown sensors are
    /// logged and skipped; the rest of the batch still applies.
    pub async fn update_distances(&self, samples: &[DistanceSample]) {
        for sample in samples {
            if let Err(e) = self.update_distance(&sample.sensor_id, sample.distance).await {
                tracing::warn!("distance sample dropped: {e}");
            }
        }
    }

    /// Change a speaker's user-requested base volume and queue the
    /// resulting output volume for push. Negative volumes are rejected
    /// without touching any state.
    pub async fn set_base_volume(&self, sensor_id: &str, base_volume: f64) -> Result<()> {
        if base_volume < 0.0 {
            return Err(SoundfieldError::InvalidVolume(base_volume));
        }

        let mut registry = self.registry.lock().await;
        let entry = registry
            .entries
            .get_mut(sensor_id)
            .ok_or_else(|| SoundfieldError::UnknownSpeaker(sensor_id.to_string()))?;

        entry.state.base_volume = base_volume;
        entry.pusher.push(entry.state.output_percent());
        Ok(())
    }

    /// Multilaterate the listener from the given range samples and the
    /// connected speakers' positions.
    ///
    /// Needs at least three connected speakers and at least three samples
    /// naming distinct connected sensors; samples for unknown sensors are
    /// silently dropped and do not count. When one sensor appears twice in
    /// a batch its last sample wins.
    pub async fn listener_position(&self, samples: &[DistanceSample]) -> Result<Vec3> {
        let registry = self.registry.lock().await;

        if registry.entries.len() < 3 {
            return Err(SoundfieldError::InsufficientData {
                have: registry.entries.len(),
                need: 3,
            });
        }

        let mut ranges: HashMap<&str, f64> = HashMap::new();
        for sample in samples {
            if registry.entries.contains_key(sample.sensor_id.as_str()) {
                ranges.insert(sample.sensor_id.as_str(), sample.distance);
            }
        }

        if ranges.len() < 3 {
            return Err(SoundfieldError::InsufficientData {
                have: ranges.len(),
                need: 3,
            });
        }

        let spheres: Vec<Sphere> = ranges
            .iter()
            .filter_map(|(id, &radius)| {
                registry
                    .entries
                    .get(*id)
                    .map(|e| Sphere::new(e.state.position, radius))
            })
            .collect();
        let start = centroid(registry.entries.values().map(|e| e.state.position));

        Ok(solver::solve(&spheres, start))
    }

    /// Snapshot of a connected speaker's state, if connected.
    pub async fn speaker(&self, sensor_id: &str) -> Option<SpeakerState> {
        let registry = self.registry.lock().await;
        registry.entries.get(sensor_id).map(|e| e.state.clone())
    }

    /// Number of currently connected speakers.
    pub async fn connected_count(&self) -> usize {
        self.registry.lock().await.entries.len()
    }

    /// Disconnect every speaker, silencing each device on the way out.
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.registry.lock().await.order.clone();
        for id in ids {
            let _ = self.disconnect_speaker(&id).await;
        }
    }
}
