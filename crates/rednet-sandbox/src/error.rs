use rednet_types::error::{ErrorKind, HasErrorKind};
use thiserror::Error;

/// Every variant renders to a short string. Host-level failures (panics,
/// stack traces) never leak past this boundary — they get normalized to
/// [`SandboxError::Runtime`] instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SandboxError {
    #[error("timeout")]
    Timeout,
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("denied capability: {0}")]
    Denied(String),
}

impl HasErrorKind for SandboxError {
    fn kind(&self) -> ErrorKind {
        match self {
            SandboxError::Timeout => ErrorKind::Timeout,
            SandboxError::Runtime(_) => ErrorKind::External,
            SandboxError::Denied(_) => ErrorKind::Permission,
        }
    }
}
