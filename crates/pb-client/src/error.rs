use thiserror::Error;

/// Why a fetch produced no payload.
///
/// Every variant is distinct from a successful fetch of an empty collection;
/// callers keep whatever data they already had and show [`FetchError::summary`]
/// next to it.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection refused, DNS failure, reset, or any other transport problem.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),

    /// No response within the configured request timeout.
    #[error("request timed out")]
    Timeout,

    /// The service answered with a non-2xx status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The body was not valid JSON.
    #[error("invalid JSON: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Transport(err)
        }
    }
}

impl FetchError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport(_) | FetchError::Timeout => true,
            FetchError::Status { status, .. } => *status >= 500 || *status == 429,
            FetchError::Decode(_) => false,
        }
    }

    /// Short message for a panel's error label.
    pub fn summary(&self) -> String {
        match self {
            FetchError::Transport(e) if e.is_connect() => "service unreachable".to_string(),
            FetchError::Transport(_) => "connection failed".to_string(),
            FetchError::Timeout => "request timed out".to_string(),
            FetchError::Status { status, .. } => format!("HTTP {status}"),
            FetchError::Decode(_) => "invalid response body".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
