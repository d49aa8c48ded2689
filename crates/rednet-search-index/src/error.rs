use rednet_types::error::{ErrorKind, HasErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchIndexError {
    #[error("no document with id {0}")]
    UnknownDocument(u64),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl HasErrorKind for SearchIndexError {
    fn kind(&self) -> ErrorKind {
        match self {
            SearchIndexError::UnknownDocument(_) => ErrorKind::NotFound,
            SearchIndexError::Persistence(_) => ErrorKind::External,
        }
    }
}
