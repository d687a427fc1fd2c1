use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("could not locate a login form on {url}")]
    NoLoginForm { url: String },
    #[error("fetch failed for {query}: HTTP {status}")]
    FetchFailed { query: String, status: StatusCode },
    #[error("unexpected data shape: {message}")]
    DataShape { message: String },
    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PortalError {
    pub fn data_shape(message: impl Into<String>) -> Self {
        Self::DataShape {
            message: message.into(),
        }
    }

    pub fn invalid_url(url: impl Into<String>, source: url::ParseError) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PortalError>;
