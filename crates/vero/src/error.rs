//! Error types for the Vero SDK.

/// Errors that can occur when using the Vero SDK.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request could not be delivered (DNS, connection refused, ...).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The tracking API answered with a non-2xx status.
    #[error("Unable to make the request - server returned {status_text} {status}, expected 2xx")]
    Status { status: u16, status_text: String },

    /// A storage-backed component was created where its medium is unavailable.
    #[error("Environment error: {0}")]
    Environment(String),

    /// No explicit user id was given and no identity is stored.
    #[error("No userId or identity provided (have you called identify?)")]
    NoIdentity,

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error while opening durable storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The global tracker was initialized twice.
    #[error("Tracker is already initialized.")]
    AlreadyInitialized,

    /// The global tracker was used before `init`.
    #[error("Tracker is not initialized. Please call init() before using the tracker.")]
    NotInitialized,
}

impl Error {
    /// HTTP status of a rejected request, if this is a status error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
