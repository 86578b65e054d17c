//! Domain error types for the synthesis gateway.

/// Errors surfaced by synthesis operations.
/// These are domain-specific errors that can be handled gracefully.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The request was rejected before any network call
    #[error("invalid request: {0}")]
    Validation(String),

    /// The provider could not be reached or the call timed out
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with a non-success status; the raw body is kept
    #[error("provider rejected the request ({status}): {body}")]
    RemoteRejected { status: u16, body: String },

    /// A well-formed reply carried neither a result nor a task id
    #[error("provider reply carried no result and no task id")]
    NoResult,

    /// The reply body did not match the provider contract
    #[error("malformed provider reply: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    /// I/O error while staging or reading a local artifact
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
