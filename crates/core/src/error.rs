use thiserror::Error;

/// Every way a tree operation can be refused.
///
/// All of these are recoverable: the tree is left exactly as it was before the
/// failing call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FsError {
    #[error("'{name}' not found in {dir}")]
    NotFound { name: String, dir: String },

    #[error("'{name}' already exists in {dir}")]
    NameCollision { name: String, dir: String },

    #[error("{dir} reached its child limit ({limit})")]
    CapacityExceeded { dir: String, limit: usize },

    #[error("disk full: {requested} more bytes requested, {available} available")]
    QuotaExceeded { requested: u64, available: u64 },

    #[error("{0} is not a directory")]
    NotADirectory(String),

    #[error("{0} is a directory")]
    IsADirectory(String),

    #[error("{0} is inside the trash")]
    InTrash(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("bad snapshot: {0}")]
    Snapshot(String),

    // std::io::Error is stringified so FsError stays comparable in tests
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for FsError {
    fn from(e: std::io::Error) -> Self {
        FsError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for FsError {
    fn from(e: serde_json::Error) -> Self {
        FsError::Snapshot(e.to_string())
    }
}

pub type FsResult<T> = Result<T, FsError>;
