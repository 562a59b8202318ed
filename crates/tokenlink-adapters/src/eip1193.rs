use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
#[cfg(not(target_arch = "wasm32"))]
use std::time::Duration;

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use alloy::sol_types::{SolInterface, SolValue};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[cfg(not(target_arch = "wasm32"))]
use tokenlink_core::resolver::parse_accounts;
use tokenlink_core::{
    chain_id_hex, parse_chain_id, quantity_hex, Eip1193Provider, PortError, ProviderDiscovery,
    Subscription, WalletEvent, CHAIN_NOT_ADDED, IERC20, UNAUTHORIZED, USER_REJECTED,
};

#[cfg(target_arch = "wasm32")]
use crate::browser;
use crate::WidgetConfig;

const UNSUPPORTED_METHOD: i64 = 4200;
const EXECUTION_REVERTED: i64 = -32000;
const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Clone)]
pub struct Eip1193Adapter {
    mode: ProviderMode,
    state: Arc<Mutex<ProviderState>>,
    listeners: Arc<Mutex<Listeners>>,
}

#[derive(Debug, Clone)]
enum ProviderMode {
    Disabled(String),
    Deterministic,
    #[cfg(not(target_arch = "wasm32"))]
    Proxy(ProxyRuntime),
    #[cfg(target_arch = "wasm32")]
    Browser,
}

#[derive(Debug, Clone)]
#[cfg(not(target_arch = "wasm32"))]
struct ProxyRuntime {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug)]
struct ProviderState {
    accounts: Vec<Address>,
    permitted: bool,
    chain_id: u64,
    known_chains: BTreeSet<u64>,
    native_balances: HashMap<(u64, Address), U256>,
    token_balances: HashMap<(u64, Address, Address), U256>,
    receipts: HashMap<B256, PendingReceipt>,
    tx_count: u64,
    block_number: u64,
    reject_wallet_prompts: bool,
    receipt_delay_polls: u32,
    scripted_failures: HashMap<String, VecDeque<PortError>>,
    request_log: Vec<(String, Value)>,
    /// Last chain/accounts the proxy reported; `None` until its first answer.
    #[cfg(not(target_arch = "wasm32"))]
    observed_chain: Option<u64>,
    #[cfg(not(target_arch = "wasm32"))]
    observed_accounts: Option<Vec<Address>>,
    #[cfg(target_arch = "wasm32")]
    browser_hooks_installed: bool,
}

#[derive(Debug)]
struct PendingReceipt {
    receipt: Value,
    polls_left: u32,
}

impl Default for ProviderState {
    fn default() -> Self {
        Self {
            accounts: vec![Address::with_last_byte(1)],
            permitted: false,
            chain_id: 1,
            known_chains: BTreeSet::from([1, 137]),
            native_balances: HashMap::new(),
            token_balances: HashMap::new(),
            receipts: HashMap::new(),
            tx_count: 0,
            block_number: 1_000,
            reject_wallet_prompts: false,
            receipt_delay_polls: 1,
            scripted_failures: HashMap::new(),
            request_log: Vec::new(),
            #[cfg(not(target_arch = "wasm32"))]
            observed_chain: None,
            #[cfg(not(target_arch = "wasm32"))]
            observed_accounts: None,
            #[cfg(target_arch = "wasm32")]
            browser_hooks_installed: false,
        }
    }
}

#[derive(Debug, Default)]
struct Listeners {
    next_id: u64,
    sinks: HashMap<u64, mpsc::UnboundedSender<WalletEvent>>,
}

impl Default for Eip1193Adapter {
    fn default() -> Self {
        Self::with_config(&WidgetConfig::from_env())
    }
}

impl Eip1193Adapter {
    pub fn with_config(config: &WidgetConfig) -> Self {
        #[cfg(target_arch = "wasm32")]
        let mode = if browser::provider_available() {
            ProviderMode::Browser
        } else if config.strict_runtime_required() {
            ProviderMode::Disabled(
                "EIP-1193 browser provider not found in production runtime profile".to_owned(),
            )
        } else {
            ProviderMode::Deterministic
        };

        #[cfg(not(target_arch = "wasm32"))]
        let mode = if let Some(ref base_url) = config.eip1193_proxy_url {
            match proxy_runtime(base_url, Duration::from_millis(config.rpc_timeout_ms)) {
                Ok(proxy) => ProviderMode::Proxy(proxy),
                Err(e) if config.strict_runtime_required() => ProviderMode::Disabled(format!(
                    "failed to initialize EIP-1193 proxy client in production profile: {e}"
                )),
                Err(e) => {
                    warn!(error = %e, "EIP-1193 proxy unavailable, using deterministic wallet");
                    ProviderMode::Deterministic
                }
            }
        } else if config.strict_runtime_required() {
            ProviderMode::Disabled(
                "EIP-1193 proxy URL not configured in production runtime profile".to_owned(),
            )
        } else {
            ProviderMode::Deterministic
        };
        Self::with_mode(mode)
    }

    pub fn deterministic() -> Self {
        Self::with_mode(ProviderMode::Deterministic)
    }

    pub fn disabled(reason: impl Into<String>) -> Self {
        Self::with_mode(ProviderMode::Disabled(reason.into()))
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn proxy(base_url: impl Into<String>, timeout: Duration) -> Result<Self, PortError> {
        Ok(Self::with_mode(ProviderMode::Proxy(proxy_runtime(
            &base_url.into(),
            timeout,
        )?)))
    }

    fn with_mode(mode: ProviderMode) -> Self {
        Self {
            mode,
            state: Arc::new(Mutex::new(ProviderState::default())),
            listeners: Arc::new(Mutex::new(Listeners::default())),
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self.mode, ProviderMode::Disabled(_))
    }

    fn check_mode(&self) -> Result<(), PortError> {
        if let ProviderMode::Disabled(reason) = &self.mode {
            return Err(PortError::Policy(reason.clone()));
        }
        Ok(())
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, ProviderState>, PortError> {
        self.state
            .lock()
            .map_err(|e| PortError::Transport(format!("provider lock poisoned: {e}")))
    }

    fn emit(&self, events: Vec<WalletEvent>) {
        if events.is_empty() {
            return;
        }
        let Ok(mut g) = self.listeners.lock() else {
            warn!("provider listener lock poisoned; events dropped");
            return;
        };
        for event in events {
            g.sinks.retain(|_, sink| sink.send(event.clone()).is_ok());
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().map(|g| g.sinks.len()).unwrap_or(0)
    }

    pub fn debug_inject_accounts_changed(&self, accounts: Vec<Address>) -> Result<(), PortError> {
        {
            let mut g = self.lock_state()?;
            g.accounts = accounts.clone();
            g.permitted = true;
        }
        self.emit(vec![WalletEvent::AccountsChanged(accounts)]);
        Ok(())
    }

    pub fn debug_inject_chain_changed(&self, chain_id: u64) -> Result<(), PortError> {
        {
            let mut g = self.lock_state()?;
            g.chain_id = chain_id;
            g.known_chains.insert(chain_id);
        }
        self.emit(vec![WalletEvent::ChainChanged(chain_id)]);
        Ok(())
    }

    pub fn debug_inject_disconnected(&self) {
        self.emit(vec![WalletEvent::Disconnected]);
    }

    pub fn debug_set_chain(&self, chain_id: u64) -> Result<(), PortError> {
        let mut g = self.lock_state()?;
        g.chain_id = chain_id;
        g.known_chains.insert(chain_id);
        Ok(())
    }

    pub fn debug_forget_chain(&self, chain_id: u64) -> Result<(), PortError> {
        self.lock_state()?.known_chains.remove(&chain_id);
        Ok(())
    }

    pub fn debug_set_accounts(&self, accounts: Vec<Address>) -> Result<(), PortError> {
        self.lock_state()?.accounts = accounts;
        Ok(())
    }

    pub fn debug_set_native_balance(
        &self,
        chain_id: u64,
        owner: Address,
        amount: U256,
    ) -> Result<(), PortError> {
        self.lock_state()?
            .native_balances
            .insert((chain_id, owner), amount);
        Ok(())
    }

    pub fn debug_set_token_balance(
        &self,
        chain_id: u64,
        token: Address,
        owner: Address,
        amount: U256,
    ) -> Result<(), PortError> {
        self.lock_state()?
            .token_balances
            .insert((chain_id, token, owner), amount);
        Ok(())
    }

    /// Makes the wallet decline switch/add prompts with code 4001.
    pub fn debug_reject_wallet_prompts(&self, reject: bool) -> Result<(), PortError> {
        self.lock_state()?.reject_wallet_prompts = reject;
        Ok(())
    }

    pub fn debug_set_receipt_delay(&self, polls: u32) -> Result<(), PortError> {
        self.lock_state()?.receipt_delay_polls = polls;
        Ok(())
    }

    /// The next call of `method` fails with `error`.
    pub fn debug_fail_next(&self, method: &str, error: PortError) -> Result<(), PortError> {
        self.lock_state()?
            .scripted_failures
            .entry(method.to_owned())
            .or_default()
            .push_back(error);
        Ok(())
    }

    /// Params of every request made for `method`, oldest first.
    pub fn requests(&self, method: &str) -> Vec<Value> {
        self.state
            .lock()
            .map(|g| {
                g.request_log
                    .iter()
                    .filter(|(m, _)| m == method)
                    .map(|(_, p)| p.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn current_chain_id(&self) -> Result<u64, PortError> {
        Ok(self.lock_state()?.chain_id)
    }

    #[cfg(not(target_arch = "wasm32"))]
    async fn proxy_call(&self, proxy: &ProxyRuntime, method: &str, params: Value) -> Result<Value, PortError> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = proxy
            .client
            .post(&proxy.base_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PortError::Transport(format!("eip1193 proxy request failed: {e}")))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| PortError::Transport(format!("eip1193 proxy json decode failed: {e}")))?;
        if let Some(err) = body.get("error") {
            return Err(rpc_error_from_json(err));
        }
        if !status.is_success() {
            return Err(PortError::Transport(format!(
                "eip1193 proxy status {status}: {body}"
            )));
        }
        let result = body
            .get("result")
            .cloned()
            .ok_or_else(|| PortError::Transport("eip1193 proxy missing result".to_owned()))?;
        self.observe_proxy_result(method, &result)?;
        Ok(result)
    }

    /// The proxy cannot push events; raise them when responses reveal a change.
    /// The first answer only sets the baseline.
    #[cfg(not(target_arch = "wasm32"))]
    fn observe_proxy_result(&self, method: &str, result: &Value) -> Result<(), PortError> {
        let mut events = Vec::new();
        match method {
            "eth_chainId" => {
                let chain_id = parse_chain_id(result)?;
                let mut g = self.lock_state()?;
                g.chain_id = chain_id;
                if let Some(previous) = g.observed_chain.replace(chain_id) {
                    if previous != chain_id {
                        events.push(WalletEvent::ChainChanged(chain_id));
                    }
                }
            }
            "eth_accounts" | "eth_requestAccounts" => {
                let accounts = parse_accounts(result)?;
                let mut g = self.lock_state()?;
                g.accounts = accounts.clone();
                if let Some(previous) = g.observed_accounts.replace(accounts.clone()) {
                    if previous != accounts {
                        events.push(WalletEvent::AccountsChanged(accounts));
                    }
                }
            }
            _ => {}
        }
        self.emit(events);
        Ok(())
    }

    /// Runs the request on the page's event loop; JS values never leave it.
    #[cfg(target_arch = "wasm32")]
    async fn browser_call(&self, method: &str, params: Value) -> Result<Value, PortError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let method = method.to_owned();
        wasm_bindgen_futures::spawn_local(async move {
            let _ = tx.send(browser::request(&method, params).await);
        });
        rx.await
            .map_err(|_| PortError::Transport("browser provider request dropped".to_owned()))?
    }

    /// Forwards `accountsChanged`/`chainChanged` from `window.ethereum` to
    /// the listeners. Installed on first subscribe, once per adapter.
    #[cfg(target_arch = "wasm32")]
    fn install_browser_hooks(&self) -> Result<(), PortError> {
        {
            let mut g = self.lock_state()?;
            if g.browser_hooks_installed {
                return Ok(());
            }
            g.browser_hooks_installed = true;
        }
        let for_accounts = self.clone();
        let for_chain = self.clone();
        let installed = browser::install_hooks(
            move |accounts| {
                if let Ok(mut g) = for_accounts.state.lock() {
                    g.accounts = accounts.clone();
                }
                for_accounts.emit(vec![WalletEvent::AccountsChanged(accounts)]);
            },
            move |chain_id| {
                if let Ok(mut g) = for_chain.state.lock() {
                    g.chain_id = chain_id;
                }
                for_chain.emit(vec![WalletEvent::ChainChanged(chain_id)]);
            },
        );
        if installed.is_err() {
            self.lock_state()?.browser_hooks_installed = false;
        }
        installed
    }

    fn deterministic_request(&self, method: &str, params: Value) -> Result<Value, PortError> {
        let mut events = Vec::new();
        let result = {
            let mut g = self.lock_state()?;
            g.request_log.push((method.to_owned(), params.clone()));
            if let Some(err) = g
                .scripted_failures
                .get_mut(method)
                .and_then(VecDeque::pop_front)
            {
                return Err(err);
            }
            handle_deterministic(&mut g, method, &params, &mut events)
        };
        self.emit(events);
        result
    }
}

#[async_trait]
impl Eip1193Provider for Eip1193Adapter {
    async fn request(&self, method: &str, params: Value) -> Result<Value, PortError> {
        debug!(method, "eip1193 request");
        match &self.mode {
            ProviderMode::Disabled(reason) => Err(PortError::Policy(reason.clone())),
            ProviderMode::Deterministic => self.deterministic_request(method, params),
            #[cfg(not(target_arch = "wasm32"))]
            ProviderMode::Proxy(proxy) => self.proxy_call(proxy, method, params).await,
            #[cfg(target_arch = "wasm32")]
            ProviderMode::Browser => self.browser_call(method, params).await,
        }
    }

    fn subscribe(
        &self,
        sink: mpsc::UnboundedSender<WalletEvent>,
    ) -> Result<Subscription, PortError> {
        self.check_mode()?;
        #[cfg(target_arch = "wasm32")]
        if matches!(self.mode, ProviderMode::Browser) {
            self.install_browser_hooks()?;
        }
        let id = {
            let mut g = self
                .listeners
                .lock()
                .map_err(|e| PortError::Transport(format!("listener lock poisoned: {e}")))?;
            g.next_id = g.next_id.saturating_add(1);
            let id = g.next_id;
            g.sinks.insert(id, sink);
            id
        };
        let listeners = Arc::clone(&self.listeners);
        Ok(Subscription::new(move || {
            if let Ok(mut g) = listeners.lock() {
                g.sinks.remove(&id);
            }
        }))
    }

    async fn disconnect(&self) -> Result<(), PortError> {
        self.check_mode()?;
        // EIP-2255: drop the dapp's account permission.
        self.request(
            "wallet_revokePermissions",
            serde_json::json!([{ "eth_accounts": {} }]),
        )
        .await
        .map(|_| ())
    }
}

impl ProviderDiscovery for Eip1193Adapter {
    fn injected(&self) -> Option<Arc<dyn Eip1193Provider>> {
        if self.is_available() {
            Some(Arc::new(self.clone()))
        } else {
            None
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn proxy_runtime(base_url: &str, timeout: Duration) -> Result<ProxyRuntime, PortError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| PortError::Transport(format!("eip1193 proxy client init failed: {e}")))?;
    Ok(ProxyRuntime {
        base_url: base_url.to_owned(),
        client,
    })
}

pub(crate) fn rpc_error_from_json(err: &Value) -> PortError {
    let code = err.get("code").and_then(Value::as_i64);
    let message = err
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| err.to_string());
    match code {
        Some(code) => PortError::Rpc { code, message },
        None => PortError::Transport(format!("eip1193 proxy returned error: {message}")),
    }
}

fn rpc(code: i64, message: impl Into<String>) -> PortError {
    PortError::Rpc {
        code,
        message: message.into(),
    }
}

fn param<'a>(params: &'a Value, idx: usize) -> Result<&'a Value, PortError> {
    params
        .get(idx)
        .ok_or_else(|| rpc(INVALID_PARAMS, format!("missing param #{idx}")))
}

fn address_field(obj: &Value, key: &str) -> Result<Address, PortError> {
    obj.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| rpc(INVALID_PARAMS, format!("missing field {key}")))?
        .parse()
        .map_err(|e| rpc(INVALID_PARAMS, format!("invalid {key}: {e}")))
}

fn data_field(obj: &Value) -> Result<Bytes, PortError> {
    obj.get("data")
        .and_then(Value::as_str)
        .unwrap_or("0x")
        .parse()
        .map_err(|e| rpc(INVALID_PARAMS, format!("invalid data: {e}")))
}

fn handle_deterministic(
    g: &mut ProviderState,
    method: &str,
    params: &Value,
    events: &mut Vec<WalletEvent>,
) -> Result<Value, PortError> {
    match method {
        "eth_requestAccounts" => {
            g.permitted = true;
            Ok(accounts_json(&g.accounts))
        }
        "eth_accounts" => {
            if g.permitted {
                Ok(accounts_json(&g.accounts))
            } else {
                Ok(Value::Array(Vec::new()))
            }
        }
        "wallet_revokePermissions" => {
            g.permitted = false;
            Ok(Value::Null)
        }
        "eth_chainId" => Ok(Value::String(chain_id_hex(g.chain_id))),
        "wallet_switchEthereumChain" => {
            let target = parse_chain_id(
                param(params, 0)?
                    .get("chainId")
                    .ok_or_else(|| rpc(INVALID_PARAMS, "missing chainId"))?,
            )?;
            if g.reject_wallet_prompts {
                return Err(rpc(USER_REJECTED, "User rejected the request."));
            }
            if !g.known_chains.contains(&target) {
                return Err(rpc(
                    CHAIN_NOT_ADDED,
                    format!(
                        "Unrecognized chain ID \"{}\". Try adding the chain using wallet_addEthereumChain first.",
                        chain_id_hex(target)
                    ),
                ));
            }
            switch_chain(g, target, events);
            Ok(Value::Null)
        }
        "wallet_addEthereumChain" => {
            let target = parse_chain_id(
                param(params, 0)?
                    .get("chainId")
                    .ok_or_else(|| rpc(INVALID_PARAMS, "missing chainId"))?,
            )?;
            if g.reject_wallet_prompts {
                return Err(rpc(USER_REJECTED, "User rejected the request."));
            }
            g.known_chains.insert(target);
            // wallets offer to switch right after adding
            switch_chain(g, target, events);
            Ok(Value::Null)
        }
        "eth_getBalance" => {
            let owner: Address = param(params, 0)?
                .as_str()
                .ok_or_else(|| rpc(INVALID_PARAMS, "address expected"))?
                .parse()
                .map_err(|e| rpc(INVALID_PARAMS, format!("invalid address: {e}")))?;
            let balance = g
                .native_balances
                .get(&(g.chain_id, owner))
                .copied()
                .unwrap_or_default();
            Ok(Value::String(quantity_hex(balance)))
        }
        "eth_call" => {
            let call = param(params, 0)?;
            let token = address_field(call, "to")?;
            let data = data_field(call)?;
            match IERC20::IERC20Calls::abi_decode(&data, true) {
                Ok(IERC20::IERC20Calls::balanceOf(c)) => {
                    let balance = g
                        .token_balances
                        .get(&(g.chain_id, token, c.owner))
                        .copied()
                        .unwrap_or_default();
                    Ok(Value::String(Bytes::from(balance.abi_encode()).to_string()))
                }
                _ => Err(rpc(EXECUTION_REVERTED, "execution reverted")),
            }
        }
        "eth_sendTransaction" => {
            let tx = param(params, 0)?;
            let from = address_field(tx, "from")?;
            let token = address_field(tx, "to")?;
            let data = data_field(tx)?;
            if !g.permitted || !g.accounts.contains(&from) {
                return Err(rpc(
                    UNAUTHORIZED,
                    "The requested account has not been authorized by the user.",
                ));
            }
            let transfer = match IERC20::IERC20Calls::abi_decode(&data, true) {
                Ok(IERC20::IERC20Calls::transfer(c)) => c,
                _ => return Err(rpc(INVALID_PARAMS, "unsupported transaction")),
            };
            let chain_id = g.chain_id;
            let from_key = (chain_id, token, from);
            let available = g.token_balances.get(&from_key).copied().unwrap_or_default();
            let success = available >= transfer.amount;
            if success {
                g.token_balances.insert(from_key, available - transfer.amount);
                let to_key = (chain_id, token, transfer.to);
                let credited = g.token_balances.get(&to_key).copied().unwrap_or_default()
                    + transfer.amount;
                g.token_balances.insert(to_key, credited);
            }

            g.tx_count = g.tx_count.saturating_add(1);
            g.block_number = g.block_number.saturating_add(1);
            let mut seed = Vec::with_capacity(16 + data.len());
            seed.extend_from_slice(&chain_id.to_be_bytes());
            seed.extend_from_slice(&g.tx_count.to_be_bytes());
            seed.extend_from_slice(&data);
            let tx_hash = keccak256(seed);
            let receipt = serde_json::json!({
                "transactionHash": tx_hash.to_string(),
                "blockNumber": quantity_hex(U256::from(g.block_number)),
                "from": from.to_string(),
                "to": token.to_string(),
                "status": if success { "0x1" } else { "0x0" },
            });
            let polls_left = g.receipt_delay_polls;
            g.receipts.insert(
                tx_hash,
                PendingReceipt {
                    receipt,
                    polls_left,
                },
            );
            Ok(Value::String(tx_hash.to_string()))
        }
        "eth_getTransactionReceipt" => {
            let hash: B256 = param(params, 0)?
                .as_str()
                .ok_or_else(|| rpc(INVALID_PARAMS, "hash expected"))?
                .parse()
                .map_err(|e| rpc(INVALID_PARAMS, format!("invalid hash: {e}")))?;
            match g.receipts.get_mut(&hash) {
                Some(pending) if pending.polls_left > 0 => {
                    pending.polls_left -= 1;
                    Ok(Value::Null)
                }
                Some(pending) => Ok(pending.receipt.clone()),
                None => Ok(Value::Null),
            }
        }
        other => Err(rpc(
            UNSUPPORTED_METHOD,
            format!("method not supported by deterministic wallet: {other}"),
        )),
    }
}

fn switch_chain(g: &mut ProviderState, target: u64, events: &mut Vec<WalletEvent>) {
    if g.chain_id != target {
        g.chain_id = target;
        events.push(WalletEvent::ChainChanged(target));
    }
}

fn accounts_json(accounts: &[Address]) -> Value {
    Value::Array(
        accounts
            .iter()
            .map(|a| Value::String(a.to_string()))
            .collect(),
    )
}
