use std::path::PathBuf;
use thiserror::Error;

/// Core error type for packwire operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid PORT value {value:?}: expected a number between 0 and 65535")]
    InvalidPort { value: String },

    #[error("Bundler engine `{program}` failed: {message}")]
    Engine { program: String, message: String },

    #[error("Compilation failed with {} error(s); nothing emitted", errors.len())]
    CompileFailed { errors: Vec<String> },

    #[error("CSS error in {asset}: {message}")]
    Css { asset: String, message: String },

    #[error("Invalid proxy entry {context:?}: {message}")]
    Proxy { context: String, message: String },

    #[error("Failed to bind dev server to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Result alias used throughout packwire-core.
pub type Result<T> = std::result::Result<T, Error>;
