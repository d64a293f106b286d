//! Error types for webconf

use thiserror::Error;

/// Result type alias using webconf Error
pub type Result<T> = std::result::Result<T, Error>;

/// webconf error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Config write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: String, id: String },

    #[error("{0}")]
    InvalidInput(String),

    #[error("Path outside of library root: {0}")]
    PathTraversal(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::Archive(e.to_string())
    }
}

impl From<walkdir::Error> for Error {
    fn from(e: walkdir::Error) -> Self {
        Error::Io(e.into())
    }
}

impl From<tempfile::PersistError> for Error {
    fn from(e: tempfile::PersistError) -> Self {
        Error::Io(e.error)
    }
}

impl Error {
    pub(crate) fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        Error::NotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }

    pub(crate) fn already_exists(kind: &str, id: impl std::fmt::Display) -> Self {
        Error::AlreadyExists {
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }
}
