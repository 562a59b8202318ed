//! `window.ethereum` access for wasm32 builds.

use alloy::primitives::Address;
use serde_json::Value;
use tracing::warn;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};

use tokenlink_core::resolver::parse_accounts;
use tokenlink_core::{parse_chain_id, PortError};

use crate::eip1193::rpc_error_from_json;

pub(crate) fn provider_available() -> bool {
    provider().is_ok()
}

pub(crate) async fn request(method: &str, params: Value) -> Result<Value, PortError> {
    let provider = provider()?;
    let request_fn = get_prop(&provider, "request")
        .ok()
        .and_then(|v| v.dyn_into::<js_sys::Function>().ok())
        .ok_or_else(|| PortError::Transport("window.ethereum.request is unavailable".to_owned()))?;

    let request = serde_json::json!({
        "method": method,
        "params": params,
    });
    let request_js = serde_wasm_bindgen::to_value(&request)
        .map_err(|e| PortError::Transport(format!("failed to encode browser request: {e}")))?;
    let promise = request_fn
        .call1(&provider, &request_js)
        .map_err(|e| PortError::Transport(format!("provider request dispatch failed: {e:?}")))?
        .dyn_into::<js_sys::Promise>()
        .map_err(|_| PortError::Transport("provider request did not return Promise".to_owned()))?;
    let result = wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(rejection)?;
    if result.is_undefined() {
        return Ok(Value::Null);
    }
    serde_wasm_bindgen::from_value(result)
        .map_err(|e| PortError::Transport(format!("failed to decode browser response: {e}")))
}

/// Registers `accountsChanged` and `chainChanged` callbacks on the provider.
/// The closures live for the rest of the page.
pub(crate) fn install_hooks(
    mut on_accounts: impl FnMut(Vec<Address>) + 'static,
    mut on_chain: impl FnMut(u64) + 'static,
) -> Result<(), PortError> {
    let provider = provider()?;
    let on_fn = get_prop(&provider, "on")
        .ok()
        .and_then(|v| v.dyn_into::<js_sys::Function>().ok())
        .or_else(|| {
            get_prop(&provider, "addListener")
                .ok()
                .and_then(|v| v.dyn_into::<js_sys::Function>().ok())
        })
        .ok_or_else(|| PortError::Transport("provider does not expose on/addListener".to_owned()))?;

    let accounts_cb = Closure::<dyn FnMut(JsValue)>::new(move |value: JsValue| {
        match js_value(value).and_then(|v| parse_accounts(&v)) {
            Ok(accounts) => on_accounts(accounts),
            Err(e) => warn!(error = %e, "unreadable accountsChanged payload"),
        }
    });
    let chain_cb = Closure::<dyn FnMut(JsValue)>::new(move |value: JsValue| {
        match js_value(value).and_then(|v| parse_chain_id(&v)) {
            Ok(chain_id) => on_chain(chain_id),
            Err(e) => warn!(error = %e, "unreadable chainChanged payload"),
        }
    });

    on_fn
        .call2(
            &provider,
            &JsValue::from_str("accountsChanged"),
            accounts_cb.as_ref().unchecked_ref(),
        )
        .map_err(|e| PortError::Transport(format!("register accountsChanged failed: {e:?}")))?;
    on_fn
        .call2(
            &provider,
            &JsValue::from_str("chainChanged"),
            chain_cb.as_ref().unchecked_ref(),
        )
        .map_err(|e| PortError::Transport(format!("register chainChanged failed: {e:?}")))?;

    accounts_cb.forget();
    chain_cb.forget();
    Ok(())
}

/// Wallets reject with `{ code, message }`; keep the code so 4001 stays a rejection.
fn rejection(err: JsValue) -> PortError {
    match serde_wasm_bindgen::from_value::<Value>(err.clone()) {
        Ok(value) if value.get("code").is_some() => rpc_error_from_json(&value),
        _ => PortError::Transport(format!("provider request rejected: {err:?}")),
    }
}

fn js_value(value: JsValue) -> Result<Value, PortError> {
    serde_wasm_bindgen::from_value(value)
        .map_err(|e| PortError::Transport(format!("failed to decode provider event: {e}")))
}

fn provider() -> Result<JsValue, PortError> {
    let window =
        web_sys::window().ok_or_else(|| PortError::Transport("missing window".to_owned()))?;
    let provider = get_prop(&window.into(), "ethereum")?;
    if provider.is_null() || provider.is_undefined() {
        return Err(PortError::NotFound("window.ethereum missing".to_owned()));
    }
    Ok(provider)
}

fn get_prop(target: &JsValue, key: &str) -> Result<JsValue, PortError> {
    js_sys::Reflect::get(target, &JsValue::from_str(key))
        .map_err(|e| PortError::Transport(format!("read provider property {key} failed: {e:?}")))
}
