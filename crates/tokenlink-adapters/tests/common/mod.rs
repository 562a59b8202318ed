#![allow(dead_code)]

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolValue;
use serde_json::{json, Value};
use tiny_http::{Response, Server};
use tokio::sync::watch;

use tokenlink_adapters::{pipeline_from_config, Eip1193Adapter, WalletConnectAdapter, WidgetConfig};
use tokenlink_core::{
    Connection, GuardMode, NetworkDescriptor, NetworkGuard, Pipeline, ProviderResolver,
    TokenDescriptor, VerifiedConnection, WidgetView, CHAIN_NOT_ADDED,
};

pub const POLYGON: u64 = 137;

pub fn holder() -> Address {
    Address::with_last_byte(1)
}

pub fn other_holder() -> Address {
    Address::with_last_byte(2)
}

pub fn recipient() -> Address {
    "0x000000000000000000000000000000000000CAFE"
        .parse()
        .expect("valid recipient")
}

pub fn usdt() -> Address {
    TokenDescriptor::polygon_usdt().address
}

/// Deterministic wallet on `chain_id` holding 2 POL and 1.5 USDT on Polygon.
pub fn funded_wallet(chain_id: u64) -> Eip1193Adapter {
    let wallet = Eip1193Adapter::deterministic();
    wallet.debug_set_chain(chain_id).expect("set chain");
    wallet
        .debug_set_native_balance(POLYGON, holder(), U256::from(2_000_000_000_000_000_000u128))
        .expect("native balance");
    wallet
        .debug_set_token_balance(POLYGON, usdt(), holder(), U256::from(1_500_000u64))
        .expect("token balance");
    wallet
}

pub fn fast_config() -> WidgetConfig {
    WidgetConfig {
        resolve_retry_delay_ms: 5,
        receipt_poll_interval_ms: 5,
        receipt_timeout_ms: 2_000,
        ..WidgetConfig::default()
    }
}

pub fn fast_pipeline(injected: Eip1193Adapter, remote: WalletConnectAdapter) -> Pipeline {
    pipeline_from_config(&fast_config(), injected, remote)
}

pub fn resolver(injected: Eip1193Adapter, remote: WalletConnectAdapter) -> ProviderResolver {
    ProviderResolver::new(
        Arc::new(injected),
        Arc::new(remote),
        3,
        Duration::from_millis(5),
    )
}

pub async fn connect(wallet: &Eip1193Adapter) -> Connection {
    resolver(wallet.clone(), WalletConnectAdapter::in_memory())
        .resolve(None)
        .await
        .expect("resolve deterministic wallet")
}

pub async fn verified(wallet: &Eip1193Adapter) -> VerifiedConnection {
    NetworkGuard::new(NetworkDescriptor::polygon(), GuardMode::AutoSwitch)
        .ensure(&connect(wallet).await)
        .await
        .expect("verify polygon")
}

pub async fn wait_for(
    rx: &mut watch::Receiver<WidgetView>,
    what: &str,
    pred: impl FnMut(&WidgetView) -> bool,
) -> WidgetView {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
        .expect("observer alive")
        .clone()
}

pub const RPC_HOLDER: &str = "0x1000000000000000000000000000000000000001";

pub type Calls = Arc<Mutex<Vec<String>>>;

/// Wallet behind a JSON-RPC endpoint, as seen by the proxy runtime.
/// Holds 1 POL and 1.5 USDT for [`RPC_HOLDER`] and refuses chain switches.
pub struct RpcWallet {
    pub url: String,
    pub calls: Calls,
    chain: Arc<Mutex<&'static str>>,
}

impl RpcWallet {
    pub fn spawn(chain_id: &'static str) -> Self {
        let server = Server::http("127.0.0.1:0").expect("start server");
        let url = format!("http://{}", server.server_addr());
        let calls = Calls::default();
        let chain = Arc::new(Mutex::new(chain_id));

        let (calls_srv, chain_srv) = (Arc::clone(&calls), Arc::clone(&chain));
        thread::spawn(move || {
            for mut req in server.incoming_requests() {
                let mut body = String::new();
                let _ = req.as_reader().read_to_string(&mut body);
                let payload: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
                let method = payload["method"].as_str().unwrap_or_default().to_owned();
                calls_srv.lock().expect("calls lock").push(method.clone());

                let chain_id = *chain_srv.lock().expect("chain lock");
                let token_balance = Bytes::from(U256::from(1_500_000u64).abi_encode()).to_string();
                let reply = match method.as_str() {
                    "eth_requestAccounts" | "eth_accounts" => json!({"result": [RPC_HOLDER]}),
                    "eth_chainId" => json!({"result": chain_id}),
                    "eth_getBalance" => json!({"result": "0xde0b6b3a7640000"}),
                    "eth_call" => json!({"result": token_balance}),
                    "wallet_switchEthereumChain" => json!({
                        "error": {"code": CHAIN_NOT_ADDED, "message": "Unrecognized chain ID"}
                    }),
                    _ => json!({"error": {"code": -32601, "message": "method not found"}}),
                };
                let mut envelope = json!({"jsonrpc": "2.0", "id": payload["id"].clone()});
                if let (Some(dst), Some(src)) = (envelope.as_object_mut(), reply.as_object()) {
                    dst.extend(src.clone());
                }
                let _ = req.respond(Response::from_string(envelope.to_string()));
            }
        });

        Self { url, calls, chain }
    }

    /// Moves the wallet to another chain without telling anyone.
    pub fn set_chain(&self, chain_id: &'static str) {
        *self.chain.lock().expect("chain lock") = chain_id;
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .filter(|m| *m == method)
            .count()
    }

    pub fn adapter(&self) -> Eip1193Adapter {
        Eip1193Adapter::proxy(self.url.clone(), Duration::from_secs(5)).expect("proxy client")
    }
}
