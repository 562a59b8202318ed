use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Identity of the chain the widget is allowed to operate on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    pub chain_id: u64,
    pub name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

impl NetworkDescriptor {
    pub fn polygon() -> Self {
        Self {
            chain_id: 137,
            name: "Polygon Mainnet".to_owned(),
            native_currency: NativeCurrency {
                name: "POL".to_owned(),
                symbol: "POL".to_owned(),
                decimals: 18,
            },
            rpc_urls: vec!["https://polygon-rpc.com".to_owned()],
            block_explorer_urls: vec!["https://polygonscan.com".to_owned()],
        }
    }

    pub fn chain_id_hex(&self) -> String {
        chain_id_hex(self.chain_id)
    }

    /// Params object for `wallet_addEthereumChain` (EIP-3085).
    pub fn add_chain_params(&self) -> Value {
        serde_json::json!({
            "chainId": self.chain_id_hex(),
            "chainName": self.name,
            "nativeCurrency": {
                "name": self.native_currency.name,
                "symbol": self.native_currency.symbol,
                "decimals": self.native_currency.decimals,
            },
            "rpcUrls": self.rpc_urls,
            "blockExplorerUrls": self.block_explorer_urls,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDescriptor {
    pub address: Address,
    pub name: String,
    pub decimals: u8,
}

impl TokenDescriptor {
    pub fn polygon_usdt() -> Self {
        Self {
            address: alloy::primitives::address!("c2132d05d31c914a87c6611c10748aeb04b58e8f"),
            name: "USDT".to_owned(),
            decimals: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedNetwork {
    pub chain_id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub account: Address,
    pub native_amount: String,
    pub token_amount: String,
    pub native_raw: U256,
    pub token_raw: U256,
    pub network: ObservedNetwork,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub recipient: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub recipient: Address,
    pub amount_raw: U256,
    pub amount: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    Injected,
    RemoteSession,
}

/// What the guard does when the wallet sits on another chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GuardMode {
    #[default]
    AutoSwitch,
    ReportOnly,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub resolve_max_attempts: u32,
    pub resolve_retry_delay: Duration,
    pub guard_mode: GuardMode,
    pub receipt_poll_interval: Duration,
    pub receipt_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            resolve_max_attempts: 3,
            resolve_retry_delay: Duration::from_millis(1_000),
            guard_mode: GuardMode::AutoSwitch,
            receipt_poll_interval: Duration::from_millis(1_000),
            receipt_timeout: Duration::from_secs(120),
        }
    }
}

pub fn chain_id_hex(chain_id: u64) -> String {
    format!("{chain_id:#x}")
}
