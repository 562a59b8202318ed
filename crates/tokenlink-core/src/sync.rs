use alloy::primitives::U256;
use alloy::sol_types::SolCall;
use tracing::debug;

use crate::connection::VerifiedConnection;
use crate::domain::{BalanceSnapshot, NetworkDescriptor, TokenDescriptor};
use crate::erc20::IERC20;
use crate::error::{Phase, PipelineError};
use crate::ports::PortError;
use crate::units::format_amount;

/// Reads native and token balances for the connection's account.
#[derive(Debug, Clone)]
pub struct BalanceSynchronizer {
    network: NetworkDescriptor,
    token: TokenDescriptor,
}

impl BalanceSynchronizer {
    pub fn new(network: NetworkDescriptor, token: TokenDescriptor) -> Self {
        Self { network, token }
    }

    /// Both balances must load; a half-fetched snapshot is never returned.
    pub async fn sync(&self, connection: &VerifiedConnection) -> Result<BalanceSnapshot, PipelineError> {
        let account = connection.account();
        let (native_raw, token_raw) =
            tokio::try_join!(self.native_balance(connection), self.token_balance(connection))
                .map_err(|e| PipelineError::from_port(Phase::FetchBalance, &e))?;

        let native_amount = format_amount(native_raw, self.network.native_currency.decimals)
            .map_err(|e| PipelineError::from_port(Phase::FetchBalance, &e))?;
        let token_amount = format_amount(token_raw, self.token.decimals)
            .map_err(|e| PipelineError::from_port(Phase::FetchBalance, &e))?;
        debug!(%account, %native_amount, %token_amount, "balances fetched");

        Ok(BalanceSnapshot {
            account,
            native_amount,
            token_amount,
            native_raw,
            token_raw,
            network: connection.network().clone(),
        })
    }

    async fn native_balance(&self, connection: &VerifiedConnection) -> Result<U256, PortError> {
        connection
            .connection()
            .native_balance(connection.account())
            .await
    }

    async fn token_balance(&self, connection: &VerifiedConnection) -> Result<U256, PortError> {
        let call = IERC20::balanceOfCall {
            owner: connection.account(),
        };
        let output = connection
            .connection()
            .call(self.token.address, call.abi_encode().into())
            .await?;
        let decoded = IERC20::balanceOfCall::abi_decode_returns(&output, true)
            .map_err(|e| PortError::Validation(format!("balanceOf decode failed: {e}")))?;
        Ok(decoded.balance)
    }
}
