use thiserror::Error;

/// Error variants surfaced while loading binding inputs and table artifacts.
///
/// Invariant violations during dispatch are not represented here; those panic.
#[derive(Debug, Error)]
pub enum NoriError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Binary serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("Incompatible binding table artifact: expected format {expected}, found {found}")]
    IncompatibleArtifact { expected: u32, found: u32 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
