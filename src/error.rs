use thiserror::Error;

/// Startup configuration problems. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GROQ_API_KEY must be set in the environment or .env file")]
    MissingApiKey,
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Problems with the frame source: nothing captured, capture stopped, or bytes
/// that are not an image.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no frame has been captured yet")]
    NoFrame,
    #[error("webcam feed stopped")]
    CaptureStopped,
    #[error("empty frame upload")]
    EmptyFrame,
    #[error("frame is not valid base64: {0}")]
    BadEncoding(#[from] base64::DecodeError),
    #[error("frame could not be decoded: {0}")]
    Undecodable(#[from] image::ImageError),
}

/// Anything that goes wrong between a decoded frame and a parsed reply.
/// Never surfaces past the classifier: it is mapped to the fallback pair.
#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("empty image input")]
    EmptyImage,
    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("model returned an empty reply")]
    EmptyReply,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(String),
    #[error("session {0} already has a request in flight")]
    Busy(String),
}
