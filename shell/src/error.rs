//! Error types for vsh

use thiserror::Error;
use vsh_sdk::FsError;

/// Result type alias for vsh operations
pub type ShellResult<T> = Result<T, ShellError>;

/// Unterminated quote or other malformed input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at position {position}")]
pub struct LexError {
    /// Character offset into the line.
    pub position: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at position {position}")]
pub struct ParseError {
    /// Character offset of the offending token.
    pub position: usize,
    /// Offending token text, `None` at end of input.
    pub token: Option<String>,
    pub message: String,
}

/// Error types for shell operations
#[derive(Error, Debug)]
pub enum ShellError {
    #[error("syntax error: {0}")]
    Lex(#[from] LexError),

    #[error("syntax error: {0}")]
    Parse(#[from] ParseError),

    /// Bad flags or argument counts, already prefixed with the command name
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    PathResolution(String),

    #[error("{0}")]
    Permission(String),

    #[error("{0}")]
    Persistence(String),

    /// A script line failed or the script could not start
    #[error("{0}")]
    Script(String),

    #[error("{0}: command not found")]
    CommandNotFound(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] vsh_config::ConfigError),
}

impl From<FsError> for ShellError {
    fn from(err: FsError) -> Self {
        match err {
            FsError::PermissionDenied(_) => Self::Permission(err.to_string()),
            FsError::Persistence(_) => Self::Persistence(err.to_string()),
            FsError::InvalidArgument(_) | FsError::Internal(_) => Self::Validation(err.to_string()),
            _ => Self::PathResolution(err.to_string()),
        }
    }
}
