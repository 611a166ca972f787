//! Simulated installation: four speakers, one wandering listener.
//!
//! Runs the full engine against an in-process audio server stub, so it
//! needs no broker and no hardware. Speakers are ranged in and connected
//! one by one, then a virtual listener walks a rectangle through the room
//! while the demo prints the estimated position next to the true one and
//! the volume pushed to each device.
//!
//! ```sh
//! cargo run --example simulate
//! ```

use async_trait::async_trait;
use soundfield::{
    DistanceSample, Engine, Settings, SoundfieldError, Vec3, VolumeControl,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Audio server stub: prints volume changes instead of talking to devices.
#[derive(Default)]
struct ConsoleAudio {
    last: Mutex<HashMap<String, u8>>,
}

#[async_trait]
impl VolumeControl for ConsoleAudio {
    async fn set_device_volume(&self, device_id: &str, percent: u8) -> soundfield::Result<()> {
        let mut last = self.last.lock().unwrap();
        if last.insert(device_id.to_string(), percent) != Some(percent) {
            println!("    [audio] {device_id} -> {percent}%");
        }
        Ok(())
    }

    async fn device_volume(&self, _device_id: &str) -> soundfield::Result<Option<f64>> {
        Ok(Some(1.0))
    }
}

/// Feed raw readings until the smoothed distance settles at `range`.
async fn settle_range(engine: &Engine, sensor_id: &str, range: f64) -> soundfield::Result<()> {
    for _ in 0..50 {
        engine.update_distance(sensor_id, range).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let settings = Settings::from_json(
        r#"{
            "smoothingFactor": 0.3,
            "speakers": [
                {"sensorId": "s1", "audioDeviceId": "corner-sw",
                 "fullVolumeDistance": 1000, "muteDistance": 6000},
                {"sensorId": "s2", "audioDeviceId": "corner-se",
                 "fullVolumeDistance": 1000, "muteDistance": 6000},
                {"sensorId": "s3", "audioDeviceId": "corner-ne",
                 "fullVolumeDistance": 1000, "muteDistance": 6000},
                {"sensorId": "s4", "audioDeviceId": "corner-nw",
                 "fullVolumeDistance": 1000, "muteDistance": 6000}
            ]
        }"#,
    )?;

    let engine = Arc::new(Engine::new(settings, Arc::new(ConsoleAudio::default())));

    // Ground truth: a 4m x 3m room with a speaker in each corner.
    let truth = [
        ("s1", Vec3::new(0.0, 0.0, 0.0)),
        ("s2", Vec3::new(4000.0, 0.0, 0.0)),
        ("s3", Vec3::new(4000.0, 3000.0, 0.0)),
        ("s4", Vec3::new(0.0, 3000.0, 0.0)),
    ];

    println!("== installing speakers ==");
    for (i, (sensor_id, spot)) in truth.iter().enumerate() {
        // The ranging tag sits at the new speaker's spot: every connected
        // speaker reports its exact distance to it before we connect.
        for (other_id, other_spot) in &truth[..i] {
            settle_range(&engine, other_id, other_spot.distance(*spot)).await?;
        }
        let state = engine.connect_speaker(sensor_id).await?;
        println!(
            "  {sensor_id} placed at ({:8.1}, {:8.1}, {:8.1})   true ({:6.1}, {:6.1}, {:6.1})",
            state.position.x, state.position.y, state.position.z, spot.x, spot.y, spot.z,
        );
    }

    println!("\n== listener walking the room ==");
    let path = [
        Vec3::new(500.0, 500.0, 1200.0),
        Vec3::new(2000.0, 500.0, 1200.0),
        Vec3::new(3500.0, 1500.0, 1200.0),
        Vec3::new(2000.0, 2500.0, 1200.0),
        Vec3::new(500.0, 1500.0, 1200.0),
    ];

    for listener in path {
        let mut samples = Vec::new();
        for (sensor_id, spot) in &truth {
            let range = spot.distance(listener);
            samples.push(DistanceSample {
                sensor_id: sensor_id.to_string(),
                distance: range,
            });
        }
        engine.update_distances(&samples).await;

        match engine.listener_position(&samples).await {
            Ok(fix) => println!(
                "  fix ({:7.1}, {:7.1}, {:7.1})   true ({:6.1}, {:6.1}, {:6.1})   off by {:.1}mm",
                fix.x, fix.y, fix.z, listener.x, listener.y, listener.z,
                fix.distance(listener),
            ),
            Err(SoundfieldError::InsufficientData { have, need }) => {
                println!("  no fix yet ({have}/{need} ranges)")
            }
            Err(e) => return Err(e.into()),
        }
    }

    println!("\n== shutting down ==");
    engine.shutdown().await;
    Ok(())
}
