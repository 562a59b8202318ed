//! TokenLink: a native wallet widget for one network and one token.

use eframe::egui;
use eyre::WrapErr;

use tokenlink_adapters::{pipeline_from_config, Eip1193Adapter, WalletConnectAdapter, WidgetConfig};
use tokenlink_core::SessionObserver;

mod app;
mod ui;

fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = WidgetConfig::from_env();
    tracing::info!(
        profile = ?config.profile,
        chain_id = config.network.chain_id,
        token = %config.token.address,
        client_id = config.client_id.as_deref().unwrap_or("anonymous"),
        "Starting TokenLink"
    );
    if config.eip1193_proxy_url.is_none() && !config.strict_runtime_required() {
        tracing::warn!("no EIP-1193 proxy configured, using the deterministic development wallet");
    }

    let runtime = tokio::runtime::Runtime::new().wrap_err("failed to start async runtime")?;
    let pipeline = pipeline_from_config(
        &config,
        Eip1193Adapter::with_config(&config),
        WalletConnectAdapter::with_config(&config),
    );
    let (observer, handle) = {
        let _guard = runtime.enter();
        SessionObserver::spawn(pipeline)
    };

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("TokenLink")
            .with_inner_size([520.0, 560.0])
            .with_min_inner_size([420.0, 420.0]),
        ..Default::default()
    };

    let rt = runtime.handle().clone();
    let result = eframe::run_native(
        "TokenLink",
        native_options,
        Box::new(move |cc| Ok(Box::new(app::App::new(cc, config, handle, rt)))),
    );

    runtime.block_on(async {
        if let Err(e) = observer.await {
            tracing::warn!(error = %e, "session observer ended abnormally");
        }
    });
    result.map_err(|e| eyre::eyre!("ui terminated with error: {e}"))
}
