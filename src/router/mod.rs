//! The orchestrating layer: object lifecycle, join handshake, per-tick
//! snapshot fan-out, and inbound message dispatch.

mod config;
mod connection;
mod error;
mod event;
#[allow(clippy::module_inception)]
mod router;

pub use config::RouterConfig;
pub use connection::{ConnectionState, HandshakePhase};
pub use error::RouterError;
pub use event::ReplicationEvent;
pub use router::{ObjectDescriptor, ReplicationRouter};
