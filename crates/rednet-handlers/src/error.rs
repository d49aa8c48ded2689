use rednet_dns::DnsError;
use rednet_sandbox::SandboxError;
use rednet_types::error::{ErrorKind, HasErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Page not found")]
    NotFound,
    #[error("parse error: {0}")]
    Parse(String),
    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxError),
    #[error("could not resolve host: {0}")]
    Resolve(#[from] DnsError),
    #[error("fetch timed out")]
    FetchTimeout,
    #[error("unrecognized url: {0}")]
    InvalidUrl(String),
}

impl HasErrorKind for HandlerError {
    fn kind(&self) -> ErrorKind {
        match self {
            HandlerError::NotFound => ErrorKind::NotFound,
            HandlerError::Parse(_) => ErrorKind::External,
            HandlerError::Sandbox(_) => ErrorKind::External,
            HandlerError::Resolve(_) => ErrorKind::Timeout,
            HandlerError::FetchTimeout => ErrorKind::Timeout,
            HandlerError::InvalidUrl(_) => ErrorKind::Validation,
        }
    }
}
