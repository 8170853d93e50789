use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Upstream API error: {0}")]
    Upstream(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Blob storage error: {0}")]
    Storage(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid factor file: {0}")]
    FactorFile(#[from] toml::de::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Errors that must abort the run instead of degrading to partial data.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Auth(_) | Error::Config(_))
    }
}
