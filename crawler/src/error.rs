use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("invalid seed url {url:?}: {source}")]
    InvalidSeed {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),

    #[error("unable to build http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("{url} is not html ({content_type})")]
    NotHtml { url: String, content_type: String },

    #[error("{url} is larger than {limit} bytes")]
    TooLarge { url: String, limit: usize },

    #[error(transparent)]
    Index(#[from] index_core::Error),
}
