use std::sync::Arc;

use alloy::primitives::Address;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

/// EIP-1193 user rejected the request.
pub const USER_REJECTED: i64 = 4001;
/// EIP-1193 requested method/account not authorized.
pub const UNAUTHORIZED: i64 = 4100;
/// MetaMask: chain has not been added to the wallet.
pub const CHAIN_NOT_ADDED: i64 = 4902;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("port not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("policy error: {0}")]
    Policy(String),
    #[error("provider error {code}: {message}")]
    Rpc { code: i64, message: String },
}

impl PortError {
    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        self.rpc_code() == Some(USER_REJECTED)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
    Disconnected,
}

/// Listener registration returned by [`Eip1193Provider::subscribe`].
/// Dropping it unsubscribes.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// A wallet transport speaking the EIP-1193 request surface.
#[async_trait]
pub trait Eip1193Provider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, PortError>;
    fn subscribe(&self, sink: mpsc::UnboundedSender<WalletEvent>)
        -> Result<Subscription, PortError>;
    async fn disconnect(&self) -> Result<(), PortError>;
}

/// Looks for a provider injected by the host (browser extension, bridge).
pub trait ProviderDiscovery: Send + Sync {
    fn injected(&self) -> Option<Arc<dyn Eip1193Provider>>;
}

/// Establishes a remote wallet session (WalletConnect).
#[async_trait]
pub trait RemoteSessionConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn Eip1193Provider>, PortError>;
    async fn disconnect(&self) -> Result<(), PortError>;
}
