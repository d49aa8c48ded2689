use rednet_types::error::{ErrorKind, HasErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("domain '{0}' already has an active dispute")]
    ActiveDisputeExists(String),
    #[error("claimant {0} has raised too many disputes in the last hour")]
    RateLimited(u64),
    #[error("claimant {0} is blacklisted")]
    Blacklisted(u64),
    #[error("no dispute found with id '{0}'")]
    NotFound(String),
    #[error("dispute '{0}' is already resolved")]
    AlreadyResolved(String),
}

impl HasErrorKind for ResolverError {
    fn kind(&self) -> ErrorKind {
        match self {
            ResolverError::ActiveDisputeExists(_) => ErrorKind::Conflict,
            ResolverError::RateLimited(_) => ErrorKind::Resource,
            ResolverError::Blacklisted(_) => ErrorKind::Permission,
            ResolverError::NotFound(_) => ErrorKind::NotFound,
            ResolverError::AlreadyResolved(_) => ErrorKind::Conflict,
        }
    }
}
