//! Error types for layer setup and execution

/// Result type for layer operations
pub type Result<T> = std::result::Result<T, LayerError>;

/// Errors surfaced by the layer and its helpers
///
/// `Configuration` errors are fatal for the call that raised them: the layer
/// cannot continue with an invalid shape or gradient-routing setup.
#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Layer used before configure/reshape")]
    NotConfigured,

    #[error("Shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Invalid filler: {0}")]
    Filler(String),

    #[error("Invalid config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
