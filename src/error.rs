//! Error types for the circadian attention scheduler.

/// Top-level error type for the scheduler and its host surfaces.
#[derive(Debug, thiserror::Error)]
pub enum CircadianError {
    /// Configuration error (invalid values, unreadable or malformed file).
    #[error("config error: {0}")]
    Config(String),

    /// External signal provider or classifier error.
    #[error("provider error: {0}")]
    Provider(String),

    /// Output channel error (speech, nudge, haptic).
    #[error("channel error: {0}")]
    Channel(String),

    /// Engine lifecycle error (engine stopped, command reply dropped).
    #[error("engine error: {0}")]
    Engine(String),

    /// Host bridge protocol error.
    #[error("host error: {0}")]
    Host(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, CircadianError>;
