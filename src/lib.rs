//! Control plane for a distance-tracked spatial audio installation
//!
//! This library estimates the 3D positions of a set of fixed loudspeakers
//! and of a moving listener from noisy point-to-point range readings, and
//! continuously attenuates each speaker's playback volume as the listener
//! moves. It supports:
//!
//! - Closed-form bootstrap placement of the first three speakers
//! - Iterative multilateration for later speakers and the listener
//! - Exponential smoothing of incoming range readings
//! - Linear distance-to-volume ramps with per-speaker thresholds
//! - In-order, latest-wins volume pushes to the audio server
//! - Event ingestion and position publication over a WebSocket broker
//!
//! # Quick Start
//!
//! ```no_run
//! use soundfield::{AudioRpcClient, Engine, EventLink, Settings};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::from_file("soundfield.json")?;
//!
//!     // Connect the audio-volume collaborator
//!     let audio = AudioRpcClient::connect(settings.audio_server_url.clone()).await?;
//!     let engine = Arc::new(Engine::new(settings, Arc::new(audio)));
//!
//!     // Drive the engine from broker events until shutdown
//!     let mut link = EventLink::new(engine.clone());
//!     link.start().await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     link.stop().await;
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Driving the engine directly
//!
//! The engine is plain async Rust; nothing requires the broker:
//!
//! ```no_run
//! # use soundfield::Engine;
//! # async fn demo(engine: &Engine) -> soundfield::Result<()> {
//! engine.connect_speaker("1A:2B:3C:4D:5E").await?;
//! engine.update_distance("1A:2B:3C:4D:5E", 1250.0).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! The library is organized into several layers:
//!
//! - **Engine**: speaker registry, lifecycle operations, volume pushes
//! - **Placement / Solver**: bootstrap geometry and multilateration
//! - **Volume**: pure distance-to-percent modulation
//! - **Transport**: broker event link (ingestion and publication)
//! - **Audio / Connection**: JSON-RPC volume control over WebSocket
//! - **Protocol**: wire message structures
//! - **Config**: settings records loaded once at startup

mod audio;
mod config;
mod connection;
mod engine;
mod error;
pub mod geometry;
pub mod placement;
mod protocol;
pub mod solver;
mod transport;
pub mod volume;

// Public exports
pub use audio::{AudioRpcClient, VolumeControl};
pub use config::{Settings, SpeakerConfig, Topics};
pub use engine::{DistanceSample, Engine, SpeakerState};
pub use error::{Result, SoundfieldError};
pub use geometry::{Sphere, Vec3};
pub use protocol::{
    DistanceBatch, DistanceReport, Envelope, ListenerReport, SpeakerReport, SpeakerRequest,
    VolumeRequest,
};
pub use transport::EventLink;
