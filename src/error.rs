use thiserror::Error;

/// Errors raised by extraction and configuration.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Outcome of a failed page fetch. One failure skips one resource.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url '{path}': {reason}")]
    InvalidUrl { path: String, reason: String },

    #[error("timed out fetching {url}")]
    Timeout { url: String },

    #[error("transport error fetching {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("fetch task for {url} aborted: {reason}")]
    Aborted { url: String, reason: String },
}
