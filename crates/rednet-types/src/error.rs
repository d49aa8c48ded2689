//! The error-kind taxonomy from spec §7. Individual crates define their own
//! `thiserror` enums (so call sites match on meaningful variants), but every
//! one of those enums implements [`HasErrorKind`] so a caller that only
//! cares about the coarse category (to decide whether to retry, surface to
//! a user, or apply a trust penalty) can ask for it uniformly.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed domain, reserved name, out-of-range config.
    Validation,
    /// No such tab, download, document, or domain.
    NotFound,
    /// Domain already registered, dispute already active, duplicate request.
    Conflict,
    /// DNS query, load, sandbox execution, dispute voting.
    Timeout,
    /// Non-owner register/transfer, blacklisted peer acting.
    Permission,
    /// Envelope failed authenticity, delta checksum mismatch.
    Integrity,
    /// A single item exceeds a cache's capacity.
    Resource,
    /// Markup parse failure, sandbox failure (opaque short string).
    External,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Permission => "permission",
            ErrorKind::Integrity => "integrity",
            ErrorKind::Resource => "resource",
            ErrorKind::External => "external",
        };
        f.write_str(s)
    }
}

pub trait HasErrorKind {
    fn kind(&self) -> ErrorKind;
}
