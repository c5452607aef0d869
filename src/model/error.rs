use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    /// The message text doubles as the wire-level error payload.
    #[error("Session ID is required")]
    MissingSessionId,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
