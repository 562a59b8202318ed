use tracing::{info, warn};

use crate::connection::{Connection, VerifiedConnection};
use crate::domain::{GuardMode, NetworkDescriptor, ObservedNetwork};
use crate::error::{Phase, PipelineError};
use crate::ports::{PortError, CHAIN_NOT_ADDED};

/// Keeps the pipeline on the configured chain.
#[derive(Debug, Clone)]
pub struct NetworkGuard {
    network: NetworkDescriptor,
    mode: GuardMode,
}

impl NetworkGuard {
    pub fn new(network: NetworkDescriptor, mode: GuardMode) -> Self {
        Self { network, mode }
    }

    pub fn network(&self) -> &NetworkDescriptor {
        &self.network
    }

    pub async fn ensure(&self, connection: &Connection) -> Result<VerifiedConnection, PipelineError> {
        self.ensure_with(connection, || {}).await
    }

    /// Like [`ensure`](Self::ensure); `on_switch` runs right before the
    /// wallet is asked to change chains.
    pub async fn ensure_with<F>(
        &self,
        connection: &Connection,
        on_switch: F,
    ) -> Result<VerifiedConnection, PipelineError>
    where
        F: FnOnce() + Send,
    {
        let observed = connection
            .chain_id()
            .await
            .map_err(|e| PipelineError::from_port(Phase::VerifyNetwork, &e))?;
        if observed == self.network.chain_id {
            return Ok(self.verified(connection));
        }

        if self.mode == GuardMode::ReportOnly {
            return Err(PipelineError::new(
                Phase::VerifyNetwork,
                format!(
                    "connected to wrong network: {observed}; please switch to {} ({})",
                    self.network.name, self.network.chain_id
                ),
            ));
        }

        info!(
            observed,
            expected = self.network.chain_id,
            "wallet on wrong chain, requesting switch"
        );
        on_switch();
        match self.request_switch(connection).await {
            Ok(()) => {}
            Err(e) if e.rpc_code() == Some(CHAIN_NOT_ADDED) => {
                info!(chain_id = self.network.chain_id, "chain unknown to wallet, adding it");
                connection
                    .request(
                        "wallet_addEthereumChain",
                        serde_json::json!([self.network.add_chain_params()]),
                    )
                    .await
                    .map_err(|e| {
                        warn!(error = %e, "wallet_addEthereumChain failed");
                        PipelineError::from_port(Phase::SwitchNetwork, &e)
                    })?;
            }
            Err(e) => {
                warn!(error = %e, "wallet_switchEthereumChain failed");
                return Err(PipelineError::from_port(Phase::SwitchNetwork, &e));
            }
        }

        let after = connection
            .chain_id()
            .await
            .map_err(|e| PipelineError::from_port(Phase::SwitchNetwork, &e))?;
        if after != self.network.chain_id {
            return Err(PipelineError::new(
                Phase::SwitchNetwork,
                format!(
                    "wallet still on chain {after} after switch request for {}",
                    self.network.chain_id
                ),
            ));
        }
        Ok(self.verified(connection))
    }

    async fn request_switch(&self, connection: &Connection) -> Result<(), PortError> {
        connection
            .request(
                "wallet_switchEthereumChain",
                serde_json::json!([{ "chainId": self.network.chain_id_hex() }]),
            )
            .await
            .map(|_| ())
    }

    fn verified(&self, connection: &Connection) -> VerifiedConnection {
        VerifiedConnection::new(
            connection.clone(),
            ObservedNetwork {
                chain_id: self.network.chain_id,
                name: self.network.name.clone(),
            },
        )
    }
}
