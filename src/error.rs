/// Boxed error returned by hooks and structured codecs.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Target URL could not be parsed or joined with the base URL.
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    /// Header name or value rejected while building the request.
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    /// Payload or destination shape is not usable with the content type.
    #[error("invalid type")]
    InvalidType,
    /// Content type has no codec.
    #[error("content type '{0}' is not supported")]
    NotSupported(String),
    /// Request payload serialization failed.
    #[error("encode error: {0}")]
    Encode(String),
    /// A hook aborted the call.
    #[error("hook error: {0}")]
    Hook(BoxError),
    /// Response status was not 200.
    #[error("invalid http status, code={code}, info={status}")]
    Status { code: u16, status: String },
    /// Transport failed to deliver the request or read the response.
    #[error("transport error: {0}")]
    Transport(TransportError),
    /// Response body was empty but a destination asked for it.
    #[error("no data")]
    NoData,
    /// Response body could not be decoded into the destination.
    #[error("decode error: {0}")]
    Decode(String),
    /// The call context was cancelled.
    #[error("call cancelled")]
    Cancelled,
    /// The call context deadline passed.
    #[error("call deadline exceeded")]
    DeadlineExceeded,
}

impl HttpError {
    /// Returns `true` for non-200 response errors.
    pub fn is_status(&self) -> bool {
        matches!(self, Self::Status { .. })
    }

    /// Numeric status code carried by a status error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns `true` when the transport reported a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(err) if err.is_timeout())
    }

    /// Returns `true` for errors produced by the call context.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

/// Failure reported by a [`Transport`](crate::Transport).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{0}")]
    Reqwest(reqwest::Error),
    /// The attempt scope expired before the exchange completed.
    #[error("attempt timed out: {0}")]
    Timeout(String),
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Whether this failure may be retried.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Reqwest(err) => err.is_timeout(),
            Self::Timeout(_) => true,
            Self::Other(_) => false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::Reqwest(err)
    }
}
