use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Missing AWS credentials: {0} is not set")]
    MissingCredentials(&'static str),

    #[error("CSV system error: {source}")]
    CsvSystemError {
        #[from]
        source: csv::Error,
    },

    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("CSV data format error: {0}")]
    CsvDataFormatError(String),

    #[error("HTTP request error: {source}")]
    HttpError {
        #[from]
        source: reqwest::Error,
    },

    #[error("Timed out after {secs}s waiting for {what}")]
    TimeoutError { what: &'static str, secs: u64 },

    #[error("Pricing API error: {status} - {body}")]
    ApiError { status: u16, body: String },

    #[error("JSON decoding error: {source}")]
    JsonError {
        #[from]
        source: serde_json::Error,
    },

    #[error("Price format error: {0}")]
    PriceFormatError(String),

    // Catch-all for anyhow errors raised by helper code
    #[error(transparent)]
    AnyhowError(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
