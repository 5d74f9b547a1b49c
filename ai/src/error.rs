use thiserror::Error;

/// Errors produced while talking to the model endpoint.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("model request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not parse model output: {0}")]
    MalformedOutput(String),
}
