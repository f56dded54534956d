use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// The requested path resolves outside the project root, or could not be resolved.
    #[error("path traversal: {path}: {reason}")]
    PathTraversal { path: String, reason: String },
    #[error("root does not exist: {0}")]
    NotFound(PathBuf),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("embedding failed: {0}")]
    Embedding(#[from] providers::ProviderError),
    #[error("version control error: {0}")]
    VersionControl(String),
    /// A blocking worker panicked or was cancelled.
    #[error("worker failed: {0}")]
    Worker(String),
}

impl CoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn traversal(path: &str, reason: impl Into<String>) -> Self {
        CoreError::PathTraversal {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;
