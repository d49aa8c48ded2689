use rednet_tabs::TabId;
use rednet_types::error::{ErrorKind, HasErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("tab {0} is already loading")]
    AlreadyLoading(TabId),
    #[error("no tab with id {0}")]
    UnknownTab(TabId),
    #[error("tab {0} has no current url to reload")]
    NothingToReload(TabId),
}

impl HasErrorKind for LoaderError {
    fn kind(&self) -> ErrorKind {
        match self {
            LoaderError::AlreadyLoading(_) => ErrorKind::Conflict,
            LoaderError::UnknownTab(_) => ErrorKind::NotFound,
            LoaderError::NothingToReload(_) => ErrorKind::Validation,
        }
    }
}
