//! Upstream client error types.

/// Errors from the upstream transit portal.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The portal rejected the token or the origin headers
    #[error("unauthorized: token or origin rejected")]
    Unauthorized,

    /// Rate limited by the portal
    #[error("rate limited by upstream")]
    RateLimited,

    /// Non-success status code
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Body was not the JSON we expected
    #[error("JSON parse error: {message}{}", body.as_deref().map(|b| format!(" (body: {b})")).unwrap_or_default())]
    Json {
        message: String,
        body: Option<String>,
    },

    /// A configured header value is not a valid HTTP header
    #[error("invalid header {name}: {value:?}")]
    InvalidHeader { name: &'static str, value: String },

    /// Recorded responses could not be read
    #[error("mock data error: {0}")]
    Mock(String),
}

impl UpstreamError {
    /// Build a JSON error carrying a short excerpt of the offending body.
    pub(crate) fn json(err: serde_json::Error, body: &str) -> Self {
        UpstreamError::Json {
            message: err.to_string(),
            body: Some(body.chars().take(500).collect()),
        }
    }
}
