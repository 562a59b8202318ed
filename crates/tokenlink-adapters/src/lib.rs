#[cfg(target_arch = "wasm32")]
mod browser;
pub mod config;
pub mod eip1193;
pub mod wc;

pub use config::{RuntimeProfile, WidgetConfig};
pub use eip1193::Eip1193Adapter;
pub use wc::{SessionAction, SessionInfo, SessionStatus, WalletConnectAdapter};

use std::sync::Arc;

use tokenlink_core::{build_pipeline, Pipeline};

/// Builds a pipeline over the given injected wallet and remote sessions.
pub fn pipeline_from_config(
    config: &WidgetConfig,
    injected: Eip1193Adapter,
    remote: WalletConnectAdapter,
) -> Pipeline {
    build_pipeline(
        config.network.clone(),
        config.token.clone(),
        &config.pipeline_settings(),
        Arc::new(injected),
        Arc::new(remote),
    )
}
