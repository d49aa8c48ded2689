use rednet_search_index::SearchIndexError;
use rednet_types::error::{ErrorKind, HasErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error(transparent)]
    Index(#[from] SearchIndexError),
    #[error("cache persistence failure: {0}")]
    CachePersistence(String),
}

impl HasErrorKind for SearchError {
    fn kind(&self) -> ErrorKind {
        match self {
            SearchError::InvalidQuery(_) => ErrorKind::Validation,
            SearchError::Index(err) => err.kind(),
            SearchError::CachePersistence(_) => ErrorKind::External,
        }
    }
}
