use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use alloy::sol_types::SolCall;
use serde_json::Value;
use tracing::{info, warn};

use crate::connection::{parse_quantity, VerifiedConnection};
use crate::domain::{TokenDescriptor, TransferReceipt, TransferRequest};
use crate::erc20::IERC20;
use crate::error::{Phase, PipelineError};
use crate::ports::PortError;
use crate::units::{format_amount, parse_amount};

/// Sends `transfer(recipient, amount)` on the configured token and waits for
/// the receipt. Never retries.
#[derive(Debug, Clone)]
pub struct TransferSubmitter {
    token: TokenDescriptor,
    poll_interval: Duration,
    timeout: Duration,
}

impl TransferSubmitter {
    pub fn new(token: TokenDescriptor, poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            token,
            poll_interval,
            timeout,
        }
    }

    pub async fn submit(
        &self,
        connection: &VerifiedConnection,
        request: &TransferRequest,
    ) -> Result<TransferReceipt, PipelineError> {
        self.submit_inner(connection, request)
            .await
            .map_err(|e| PipelineError::from_port(Phase::SubmitTransfer, &e))
    }

    async fn submit_inner(
        &self,
        connection: &VerifiedConnection,
        request: &TransferRequest,
    ) -> Result<TransferReceipt, PortError> {
        let recipient: Address = request
            .recipient
            .trim()
            .parse()
            .map_err(|e| PortError::Validation(format!("invalid recipient address: {e}")))?;
        let amount_raw = parse_amount(&request.amount, self.token.decimals)?;
        let call = IERC20::transferCall {
            to: recipient,
            amount: amount_raw,
        };

        let tx_hash = connection
            .connection()
            .send_transaction(self.token.address, call.abi_encode().into())
            .await?;
        info!(%tx_hash, %recipient, %amount_raw, "transfer submitted, awaiting receipt");

        let receipt = tokio::time::timeout(self.timeout, self.wait_for_receipt(connection, tx_hash))
            .await
            .map_err(|_| {
                PortError::Transport(format!(
                    "transaction {tx_hash} not confirmed within {}s",
                    self.timeout.as_secs()
                ))
            })??;

        if !receipt_succeeded(&receipt)? {
            warn!(%tx_hash, "transfer reverted");
            return Err(PortError::Transport(format!("transaction {tx_hash} reverted")));
        }
        let block_number = receipt
            .get("blockNumber")
            .filter(|v| !v.is_null())
            .map(parse_quantity)
            .transpose()?
            .map(|n| n.saturating_to::<u64>());

        Ok(TransferReceipt {
            tx_hash,
            block_number,
            recipient,
            amount_raw,
            amount: format_amount(amount_raw, self.token.decimals)?,
        })
    }

    async fn wait_for_receipt(
        &self,
        connection: &VerifiedConnection,
        tx_hash: B256,
    ) -> Result<Value, PortError> {
        loop {
            if let Some(receipt) = connection.connection().transaction_receipt(tx_hash).await? {
                return Ok(receipt);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn receipt_succeeded(receipt: &Value) -> Result<bool, PortError> {
    match receipt.get("status") {
        // pre-Byzantium receipts carry no status
        None | Some(Value::Null) => Ok(true),
        Some(status) => Ok(parse_quantity(status)? == U256::from(1u8)),
    }
}
