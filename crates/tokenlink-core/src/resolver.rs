use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::domain::TransportKind;
use crate::error::{Phase, PipelineError};
use crate::ports::{Eip1193Provider, PortError, ProviderDiscovery, RemoteSessionConnector};

/// Finds a usable wallet transport: injected first, remote session second.
pub struct ProviderResolver {
    discovery: Arc<dyn ProviderDiscovery>,
    remote: Arc<dyn RemoteSessionConnector>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl ProviderResolver {
    pub fn new(
        discovery: Arc<dyn ProviderDiscovery>,
        remote: Arc<dyn RemoteSessionConnector>,
        max_attempts: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            discovery,
            remote,
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    pub fn remote(&self) -> &Arc<dyn RemoteSessionConnector> {
        &self.remote
    }

    /// Returns a connection for `requested`, or for the wallet's first account
    /// when no account was requested.
    pub async fn resolve(&self, requested: Option<Address>) -> Result<Connection, PipelineError> {
        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            match self.try_resolve(requested).await {
                Ok(connection) => {
                    info!(
                        attempt,
                        kind = ?connection.kind(),
                        account = %connection.account(),
                        "wallet transport resolved"
                    );
                    return Ok(connection);
                }
                Err(e) if e.is_user_rejection() || matches!(e, PortError::Policy(_)) => {
                    debug!(attempt, error = %e, "transport resolution refused, not retrying");
                    return Err(PipelineError::from_port(Phase::Resolve, &e));
                }
                Err(e) => {
                    warn!(attempt, max = self.max_attempts, error = %e, "transport resolution failed");
                    last_error = Some(e);
                }
            }
            if attempt < self.max_attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        let detail = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no transport".to_owned());
        Err(PipelineError::new(
            Phase::Resolve,
            format!(
                "no wallet transport available after {} attempts: {detail}",
                self.max_attempts
            ),
        ))
    }

    async fn try_resolve(&self, requested: Option<Address>) -> Result<Connection, PortError> {
        let (kind, transport) = match self.discovery.injected() {
            Some(provider) => (TransportKind::Injected, provider),
            None => {
                debug!("no injected provider, requesting remote session");
                (TransportKind::RemoteSession, self.remote.connect().await?)
            }
        };
        let account = select_account(transport.as_ref(), requested).await?;
        Ok(Connection::new(kind, transport, account))
    }
}

async fn select_account(
    transport: &dyn Eip1193Provider,
    requested: Option<Address>,
) -> Result<Address, PortError> {
    let result = transport
        .request("eth_requestAccounts", serde_json::json!([]))
        .await?;
    let accounts = parse_accounts(&result)?;
    match requested {
        Some(account) if accounts.contains(&account) => Ok(account),
        Some(account) => Err(PortError::Policy(format!(
            "account {account} is not exposed by the wallet"
        ))),
        None => accounts.first().copied().ok_or_else(|| {
            PortError::Policy("no wallet accounts available; unlock or connect the wallet".to_owned())
        }),
    }
}

pub fn parse_accounts(value: &serde_json::Value) -> Result<Vec<Address>, PortError> {
    let arr = value
        .as_array()
        .ok_or_else(|| PortError::Transport("accounts result must be an array".to_owned()))?;
    arr.iter()
        .map(|item| {
            let raw = item
                .as_str()
                .ok_or_else(|| PortError::Transport("account must be a string".to_owned()))?;
            raw.parse()
                .map_err(|e| PortError::Validation(format!("invalid account address: {e}")))
        })
        .collect()
}
