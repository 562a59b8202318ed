use std::time::Duration;

use tokenlink_core::{GuardMode, NetworkDescriptor, PipelineSettings, TokenDescriptor};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeProfile {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct WidgetConfig {
    pub profile: RuntimeProfile,
    pub network: NetworkDescriptor,
    pub token: TokenDescriptor,
    pub client_id: Option<String>,
    pub walletconnect_project_id: Option<String>,
    pub eip1193_proxy_url: Option<String>,
    pub rpc_timeout_ms: u64,
    pub resolve_max_attempts: u32,
    pub resolve_retry_delay_ms: u64,
    pub guard_mode: GuardMode,
    pub receipt_poll_interval_ms: u64,
    pub receipt_timeout_ms: u64,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            profile: RuntimeProfile::Development,
            network: NetworkDescriptor::polygon(),
            token: TokenDescriptor::polygon_usdt(),
            client_id: None,
            walletconnect_project_id: None,
            eip1193_proxy_url: None,
            rpc_timeout_ms: 15_000,
            resolve_max_attempts: 3,
            resolve_retry_delay_ms: 1_000,
            guard_mode: GuardMode::AutoSwitch,
            receipt_poll_interval_ms: 1_000,
            receipt_timeout_ms: 120_000,
        }
    }
}

impl WidgetConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from `lookup`; unparsable values fall back to
    /// defaults with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        if let Some(profile) = get("TOKENLINK_PROFILE") {
            match profile.to_ascii_lowercase().as_str() {
                "production" | "prod" => cfg.profile = RuntimeProfile::Production,
                "development" | "dev" => cfg.profile = RuntimeProfile::Development,
                other => warn!(value = other, "unknown TOKENLINK_PROFILE, using development"),
            }
        }
        if let Some(mode) = get("TOKENLINK_GUARD_MODE") {
            match mode.to_ascii_lowercase().as_str() {
                "auto-switch" => cfg.guard_mode = GuardMode::AutoSwitch,
                "report-only" => cfg.guard_mode = GuardMode::ReportOnly,
                other => warn!(value = other, "unknown TOKENLINK_GUARD_MODE, using auto-switch"),
            }
        }
        cfg.eip1193_proxy_url = get("TOKENLINK_EIP1193_PROXY_URL");
        cfg.walletconnect_project_id = get("TOKENLINK_WALLETCONNECT_PROJECT_ID");
        cfg.client_id = get("TOKENLINK_CLIENT_ID");
        if let Some(raw) = get("TOKENLINK_RPC_TIMEOUT_MS") {
            match raw.parse() {
                Ok(ms) => cfg.rpc_timeout_ms = ms,
                Err(e) => warn!(value = %raw, error = %e, "invalid TOKENLINK_RPC_TIMEOUT_MS"),
            }
        }
        cfg
    }

    pub fn strict_runtime_required(&self) -> bool {
        self.profile == RuntimeProfile::Production
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            resolve_max_attempts: self.resolve_max_attempts,
            resolve_retry_delay: Duration::from_millis(self.resolve_retry_delay_ms),
            guard_mode: self.guard_mode,
            receipt_poll_interval: Duration::from_millis(self.receipt_poll_interval_ms),
            receipt_timeout: Duration::from_millis(self.receipt_timeout_ms),
        }
    }
}
