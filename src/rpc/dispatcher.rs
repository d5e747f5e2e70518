use std::collections::HashMap;

use log::warn;

use super::error::RpcError;
use super::mode::{MethodId, RpcMode, RpcPermission, RpcTarget};
use crate::types::Participant;

/// Resolution key: a method identity plus the generic-argument tags that
/// select one concrete instantiation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RpcKey {
    pub method: MethodId,
    pub generic_args: Vec<u32>,
}

impl RpcKey {
    pub fn plain(method: MethodId) -> Self {
        Self {
            method,
            generic_args: Vec::new(),
        }
    }
}

/// Registration-time configuration of one callable.
#[derive(Clone, Copy, Debug)]
pub struct RpcConfig {
    pub mode: RpcMode,
    pub permission: RpcPermission,
    /// Whether the method may be invoked by a network message at all.
    /// Locally callable helpers register with `false`; a remote call naming
    /// one is treated as forged and the sender is kicked.
    pub remote_authorized: bool,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            mode: RpcMode::Broadcast,
            permission: RpcPermission::Any,
            remote_authorized: true,
        }
    }
}

/// One resolved invocation, handed to the registered callable. `target` is
/// `None` for static calls.
pub struct RpcInvocation<'a, C> {
    pub target: Option<RpcTarget>,
    pub caller: Participant<C>,
    pub args: &'a [u8],
}

type RpcHandler<C> = Box<dyn FnMut(RpcInvocation<'_, C>) -> Result<(), RpcError> + Send>;

struct RegisteredRpc<C> {
    config: RpcConfig,
    handler: RpcHandler<C>,
}

/// Registration-time table mapping stable numeric identities to callables.
/// Replaces reflection-based resolution: generic methods are resolved via
/// explicit per-instantiation registration, not runtime reconstruction.
pub struct RpcDispatcher<C> {
    handlers: HashMap<RpcKey, RegisteredRpc<C>>,
}

impl<C: Copy + Eq> RpcDispatcher<C> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers a callable for one method instantiation.
    ///
    /// # Panics
    ///
    /// Panics if the instantiation is already registered; double
    /// registration is a local logic bug. Use [`Self::try_register`] for
    /// non-panicking error handling.
    pub fn register<F>(&mut self, key: RpcKey, config: RpcConfig, handler: F)
    where
        F: FnMut(RpcInvocation<'_, C>) -> Result<(), RpcError> + Send + 'static,
    {
        self.try_register(key, config, handler)
            .expect("rpc method cannot be registered more than once")
    }

    pub fn try_register<F>(
        &mut self,
        key: RpcKey,
        config: RpcConfig,
        handler: F,
    ) -> Result<(), RpcError>
    where
        F: FnMut(RpcInvocation<'_, C>) -> Result<(), RpcError> + Send + 'static,
    {
        if self.handlers.contains_key(&key) {
            return Err(RpcError::AlreadyRegistered { method: key.method });
        }
        self.handlers.insert(
            key,
            RegisteredRpc {
                config,
                handler: Box::new(handler),
            },
        );
        Ok(())
    }

    pub fn config(&self, key: &RpcKey) -> Option<RpcConfig> {
        self.handlers.get(key).map(|registered| registered.config)
    }

    /// Invokes the callable for `key`, assuming the caller already passed
    /// the permission gate. Handler failures are logged and swallowed into
    /// the returned error; they never tear down a connection.
    pub fn invoke(
        &mut self,
        key: &RpcKey,
        invocation: RpcInvocation<'_, C>,
    ) -> Result<(), RpcError> {
        let registered = self
            .handlers
            .get_mut(key)
            .ok_or(RpcError::UnknownMethod { method: key.method })?;
        if let Err(error) = (registered.handler)(invocation) {
            warn!("rpc handler failed: {}", error);
            return Err(RpcError::HandlerFailed {
                method: key.method,
                reason: error.to_string(),
            });
        }
        Ok(())
    }
}

impl<C: Copy + Eq> Default for RpcDispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}
