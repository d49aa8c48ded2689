//! Shared domain types for the rednet core: the things more than one
//! component crate needs to agree on (node ids, timestamps, the domain name
//! grammar, wire envelopes, the error taxonomy, and the small async
//! scaffolding every component builds its lifecycle on).

pub mod config;
pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod peers;
pub mod socket;
pub mod wire;

pub use domain::{DomainError, ParsedDomain};
pub use error::ErrorKind;
pub use lifecycle::WithStartAndShutdown;
pub use peers::{PeerDirectory, PeerKind};
pub use socket::{Socket, Task};

/// Integer identity of a participant on the broadcast network.
pub type NodeId = u64;

/// Milliseconds since the Unix epoch. Always produced by [`now_ms`].
pub type Timestamp = u64;

/// The only place `SystemTime::now()` is called: every component asks for
/// "now" through here so tests can see a single seam to control if needed.
pub fn now_ms() -> Timestamp {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis() as Timestamp
}
