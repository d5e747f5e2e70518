//! The transport seam. The core never opens sockets: it hands finished
//! message payloads to an implementation of [`Transport`] and receives raw
//! buffers back through [`crate::router::ReplicationRouter::receive`],
//! together with the transport-supplied sender identity.

/// Bidirectional byte transport with a reliable and an unreliable channel
/// primitive. Reliable delivery is guaranteed-once but not ordered relative
/// to unreliable traffic for the same object.
pub trait Transport<C> {
    fn send_reliable(&mut self, connection: &C, payload: Vec<u8>);
    fn send_unreliable(&mut self, connection: &C, payload: Vec<u8>);
    /// Terminates a connection with a short human-readable reason.
    fn disconnect(&mut self, connection: &C, reason: &str);
}
