#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The request never produced an HTTP response (connect, timeout, body read).
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The upstream answered with a success status but a body that is not JSON.
    #[error("invalid response from {url}: {detail}")]
    InvalidResponse { url: String, detail: String },

    #[error("token error: {0}")]
    Token(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Attempted upstream URL, when the error came from an upstream call.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Transport { url, .. } | Self::InvalidResponse { url, .. } => Some(url),
            Self::Token(_) | Self::Config(_) => None,
        }
    }
}
