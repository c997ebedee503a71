use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conversion failed: cannot read {value} as {datatype}")]
    Conversion { value: String, datatype: String },

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Operation timed out after {millis} ms: {what}")]
    Timeout { what: String, millis: u128 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Operation(format!("json: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
