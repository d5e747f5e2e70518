//! Remote-procedure-call dispatch with authority-based permission checks.

mod dispatcher;
mod error;
mod mode;

pub use dispatcher::{RpcConfig, RpcDispatcher, RpcInvocation, RpcKey};
pub use error::RpcError;
pub use mode::{MethodId, RpcMode, RpcPermission, RpcTarget};
