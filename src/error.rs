use thiserror::Error;

/// Failures reported by the completion service.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
}

/// Every condition that ends a watch run.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("no visible window title starts with '{prefix}'")]
    WindowNotFound { prefix: String },

    #[error("API credential not found in environment variable {var}")]
    MissingCredential { var: String },

    #[error("window capture failed: {0}")]
    Capture(String),

    #[error("OCR engine failed: {0}")]
    OcrEngineFailure(String),

    #[error("completion service error: {0}")]
    CompletionService(#[from] CompletionError),

    #[error("invalid settings: {0}")]
    Settings(String),
}
