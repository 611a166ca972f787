use thiserror::Error;

/// Result type for sound field operations
pub type Result<T> = std::result::Result<T, SoundfieldError>;

/// Errors that can occur while running the sound field control plane
#[derive(Error, Debug)]
pub enum SoundfieldError {
    /// WebSocket connection error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connection was closed unexpectedly
    #[error("Connection closed")]
    ConnectionClosed,

    /// Request timed out waiting for response
    #[error("Request timeout")]
    Timeout,

    /// The audio server answered with a JSON-RPC error
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// Error message from the audio server
        message: String,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation referenced a sensor id with no configuration or no
    /// connected speaker; recoverable, the operation is a no-op
    #[error("Unknown speaker: {0}")]
    UnknownSpeaker(String),

    /// A negative base volume was requested; rejected, no state change
    #[error("Invalid volume: {0}")]
    InvalidVolume(f64),

    /// Fewer than three speakers or three distinct range samples were
    /// available for multilateration; retry once more data arrives
    #[error("Insufficient data for multilateration: have {have}, need {need}")]
    InsufficientData {
        /// Usable ranging spheres
        have: usize,
        /// Minimum required
        need: usize,
    },

    /// Settings file was malformed or violated an invariant
    #[error("Configuration error: {0}")]
    Config(String),
}
