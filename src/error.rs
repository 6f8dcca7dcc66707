use thiserror::Error;

#[derive(Error, Debug)]
pub enum DefaulterError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Data corruption: {message}")]
    DataCorruption { message: String },
    #[error("Invalid default for '{attribute}' on {model}: {message}")]
    Declaration { model: String, attribute: String, message: String },
    #[error("Unknown model: {0}")]
    UnknownModel(String),
    #[error("Model already defined with a different parent: {0}")]
    DuplicateModel(String),
    #[error("Unknown attribute '{attribute}' for {model}")]
    UnknownAttribute { model: String, attribute: String },
    #[error("Cannot assign '{attribute}' on {model}: {message}")]
    InvalidAssignment { model: String, attribute: String, message: String },
    #[error("Could not find {model} with id {id}")]
    RecordNotFound { model: String, id: i64 },
    #[error("Callback failed: {0}")]
    Callback(String),
    #[error("{0}")]
    Expectation(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, DefaulterError>;

// Helper conversions
impl From<rusqlite::Error> for DefaulterError {
    fn from(e: rusqlite::Error) -> Self { Self::Persistence(e.to_string()) }
}
impl From<config::ConfigError> for DefaulterError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
impl From<serde_json::Error> for DefaulterError {
    fn from(e: serde_json::Error) -> Self { Self::DataCorruption { message: e.to_string() } }
}
