use thiserror::Error;

#[derive(Debug, Error)]
pub enum FanoutError {
    /// The channel or socket to the recipient could not be used.
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    /// The recipient is not connected anywhere.
    #[error("No route to {0}")]
    NoRoute(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
