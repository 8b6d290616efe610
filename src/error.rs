use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    /// The request was well-formed but its values cannot be simulated.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to decode request: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to start physics worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("physics worker is no longer running")]
    Disconnected,
}

pub type SimResult<T> = Result<T, SimError>;
