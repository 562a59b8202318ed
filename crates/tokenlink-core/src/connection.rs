use std::sync::Arc;

use alloy::primitives::{Address, Bytes, B256, U256};
use serde_json::Value;

use crate::domain::{ObservedNetwork, TransportKind};
use crate::ports::{Eip1193Provider, PortError};

/// Wallet transport bound to one signing account for the length of a run.
#[derive(Clone)]
pub struct Connection {
    kind: TransportKind,
    transport: Arc<dyn Eip1193Provider>,
    account: Address,
}

impl Connection {
    pub fn new(kind: TransportKind, transport: Arc<dyn Eip1193Provider>, account: Address) -> Self {
        Self {
            kind,
            transport,
            account,
        }
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn transport(&self) -> &Arc<dyn Eip1193Provider> {
        &self.transport
    }

    pub async fn request(&self, method: &str, params: Value) -> Result<Value, PortError> {
        self.transport.request(method, params).await
    }

    pub async fn chain_id(&self) -> Result<u64, PortError> {
        let result = self.request("eth_chainId", serde_json::json!([])).await?;
        parse_chain_id(&result)
    }

    pub async fn native_balance(&self, account: Address) -> Result<U256, PortError> {
        let result = self
            .request(
                "eth_getBalance",
                serde_json::json!([account.to_string(), "latest"]),
            )
            .await?;
        parse_quantity(&result)
    }

    pub async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, PortError> {
        let result = self
            .request(
                "eth_call",
                serde_json::json!([{ "to": to.to_string(), "data": data.to_string() }, "latest"]),
            )
            .await?;
        let raw = result
            .as_str()
            .ok_or_else(|| PortError::Transport("eth_call must return hex data".to_owned()))?;
        raw.parse()
            .map_err(|e| PortError::Validation(format!("invalid eth_call result: {e}")))
    }

    pub async fn send_transaction(&self, to: Address, data: Bytes) -> Result<B256, PortError> {
        let tx = serde_json::json!({
            "from": self.account.to_string(),
            "to": to.to_string(),
            "data": data.to_string(),
        });
        let result = self
            .request("eth_sendTransaction", serde_json::json!([tx]))
            .await?;
        let hash = result.as_str().ok_or_else(|| {
            PortError::Transport("eth_sendTransaction must return tx hash".to_owned())
        })?;
        hash.parse()
            .map_err(|e| PortError::Validation(format!("invalid tx hash: {e}")))
    }

    pub async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<Value>, PortError> {
        let result = self
            .request(
                "eth_getTransactionReceipt",
                serde_json::json!([tx_hash.to_string()]),
            )
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        Ok(Some(result))
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("kind", &self.kind)
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

/// A connection whose chain was confirmed by the network guard.
#[derive(Debug, Clone)]
pub struct VerifiedConnection {
    connection: Connection,
    network: ObservedNetwork,
}

impl VerifiedConnection {
    pub(crate) fn new(connection: Connection, network: ObservedNetwork) -> Self {
        Self {
            connection,
            network,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn network(&self) -> &ObservedNetwork {
        &self.network
    }

    pub fn account(&self) -> Address {
        self.connection.account()
    }
}

/// Accepts a JSON number, a decimal string or a `0x` hex string.
pub fn parse_chain_id(value: &Value) -> Result<u64, PortError> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    let s = value
        .as_str()
        .ok_or_else(|| PortError::Validation("chain id must be string or number".to_owned()))?;
    parse_chain_id_str(s)
}

pub fn parse_chain_id_str(raw: &str) -> Result<u64, PortError> {
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
            .map_err(|e| PortError::Validation(format!("invalid hex chain id: {e}")))
    } else {
        raw.parse()
            .map_err(|e| PortError::Validation(format!("invalid chain id: {e}")))
    }
}

/// Parses a JSON-RPC hex quantity (`"0x1bc16d674ec80000"`).
pub fn parse_quantity(value: &Value) -> Result<U256, PortError> {
    let raw = value
        .as_str()
        .ok_or_else(|| PortError::Validation("quantity must be a hex string".to_owned()))?;
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| PortError::Validation(format!("quantity must be 0x-prefixed: {raw}")))?;
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16)
        .map_err(|e| PortError::Validation(format!("invalid quantity {raw}: {e}")))
}

pub fn quantity_hex(value: U256) -> String {
    format!("0x{value:x}")
}
