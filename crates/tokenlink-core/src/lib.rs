pub mod connection;
pub mod controller;
pub mod domain;
pub mod erc20;
pub mod error;
pub mod guard;
pub mod observer;
pub mod pipeline;
pub mod ports;
pub mod resolver;
pub mod state_machine;
pub mod sync;
pub mod transfer;
pub mod units;

pub use connection::{
    parse_chain_id, parse_quantity, quantity_hex, Connection, VerifiedConnection,
};
pub use controller::{PipelineController, RunReason, RunTicket, TransferOutcome, WidgetView};
pub use domain::{
    chain_id_hex, BalanceSnapshot, GuardMode, NativeCurrency, NetworkDescriptor, ObservedNetwork,
    PipelineSettings, TokenDescriptor, TransferReceipt, TransferRequest, TransportKind,
};
pub use erc20::IERC20;
pub use error::{Phase, PipelineError};
pub use guard::NetworkGuard;
pub use observer::{SessionCommand, SessionHandle, SessionObserver};
pub use pipeline::{Pipeline, RunEvent};
pub use ports::{
    Eip1193Provider, PortError, ProviderDiscovery, RemoteSessionConnector, Subscription,
    WalletEvent, CHAIN_NOT_ADDED, UNAUTHORIZED, USER_REJECTED,
};
pub use resolver::ProviderResolver;
pub use state_machine::{transition, PipelineAction, PipelinePhase, TransitionError};
pub use sync::BalanceSynchronizer;
pub use transfer::TransferSubmitter;
pub use units::{format_amount, is_decimal_string, parse_amount};

use std::sync::Arc;

/// Wires the four pipeline components from static configuration.
pub fn build_pipeline(
    network: NetworkDescriptor,
    token: TokenDescriptor,
    settings: &PipelineSettings,
    discovery: Arc<dyn ProviderDiscovery>,
    remote: Arc<dyn RemoteSessionConnector>,
) -> Pipeline {
    Pipeline::new(
        ProviderResolver::new(
            discovery,
            remote,
            settings.resolve_max_attempts,
            settings.resolve_retry_delay,
        ),
        NetworkGuard::new(network.clone(), settings.guard_mode),
        BalanceSynchronizer::new(network, token.clone()),
        TransferSubmitter::new(
            token,
            settings.receipt_poll_interval,
            settings.receipt_timeout,
        ),
    )
}
