use rednet_types::error::{ErrorKind, HasErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SharedError {
    #[error("download '{0}' not found")]
    DownloadNotFound(String),
    #[error("download '{0}' is already terminal")]
    DownloadAlreadyTerminal(String),
    #[error("failed to persist cookies to disk: {0}")]
    Persistence(String),
}

impl HasErrorKind for SharedError {
    fn kind(&self) -> ErrorKind {
        match self {
            SharedError::DownloadNotFound(_) => ErrorKind::NotFound,
            SharedError::DownloadAlreadyTerminal(_) => ErrorKind::Conflict,
            SharedError::Persistence(_) => ErrorKind::External,
        }
    }
}
