use rednet_types::domain::DomainError;
use rednet_types::error::{ErrorKind, HasErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DnsError {
    #[error("invalid domain: {0}")]
    InvalidDomain(#[from] DomainError),
    #[error("domain '{0}' is not owned by this node")]
    NotOwner(String),
    #[error("alias target must be a computer domain owned by this node")]
    InvalidTarget,
    #[error("domain '{0}' is already registered by another node")]
    AlreadyRegistered(String),
    #[error("no record found for domain '{0}'")]
    NotFound(String),
    #[error("resolution of '{0}' timed out")]
    ResolutionTimeout(String),
    #[error("response for '{0}' failed authenticity checks")]
    Inauthentic(String),
}

impl HasErrorKind for DnsError {
    fn kind(&self) -> ErrorKind {
        match self {
            DnsError::InvalidDomain(_) => ErrorKind::Validation,
            DnsError::NotOwner(_) => ErrorKind::Permission,
            DnsError::InvalidTarget => ErrorKind::Validation,
            DnsError::AlreadyRegistered(_) => ErrorKind::Conflict,
            DnsError::NotFound(_) => ErrorKind::NotFound,
            DnsError::ResolutionTimeout(_) => ErrorKind::Timeout,
            DnsError::Inauthentic(_) => ErrorKind::Integrity,
        }
    }
}
