use thiserror::Error;

use super::MethodId;

/// Failures on the RPC dispatch path. `UnknownMethod` and
/// `NotRemoteAuthorized` coming from a network message indicate a forged or
/// tampered call and get the sender kicked; the rest are logged and
/// dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// The method identity (or generic instantiation) resolves to nothing.
    #[error("rpc method {method:?} is not registered")]
    UnknownMethod { method: MethodId },

    /// The method exists but was never marked callable from the network.
    #[error("rpc method {method:?} is not authorized for remote invocation")]
    NotRemoteAuthorized { method: MethodId },

    /// The caller fails the method's permission predicate.
    #[error("caller is not permitted to invoke rpc method {method:?}")]
    NotPermitted { method: MethodId },

    /// The handler itself failed. Caught and logged; never propagates to
    /// the network stack.
    #[error("rpc method {method:?} handler failed: {reason}")]
    HandlerFailed { method: MethodId, reason: String },

    /// A method was registered twice for the same instantiation. Local
    /// logic bug.
    #[error("rpc method {method:?} is already registered")]
    AlreadyRegistered { method: MethodId },
}
