use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::connection::{Connection, VerifiedConnection};
use crate::controller::RunTicket;
use crate::domain::{BalanceSnapshot, TransferReceipt, TransferRequest};
use crate::error::PipelineError;
use crate::guard::NetworkGuard;
use crate::resolver::ProviderResolver;
use crate::sync::BalanceSynchronizer;
use crate::transfer::TransferSubmitter;

/// Progress and results reported by a run back to the session.
#[derive(Debug)]
pub enum RunEvent {
    Resolved(RunTicket, Connection),
    SwitchRequested(RunTicket),
    Verified(RunTicket, VerifiedConnection),
    Synced(RunTicket, Result<BalanceSnapshot, PipelineError>),
    Failed(RunTicket, PipelineError),
    TransferFinished(RunTicket, Result<TransferReceipt, PipelineError>),
}

pub struct Pipeline {
    pub resolver: ProviderResolver,
    pub guard: NetworkGuard,
    pub synchronizer: BalanceSynchronizer,
    pub submitter: TransferSubmitter,
}

impl Pipeline {
    pub fn new(
        resolver: ProviderResolver,
        guard: NetworkGuard,
        synchronizer: BalanceSynchronizer,
        submitter: TransferSubmitter,
    ) -> Self {
        Self {
            resolver,
            guard,
            synchronizer,
            submitter,
        }
    }

    /// resolve -> verify (switch) -> sync.
    pub async fn run(self: Arc<Self>, ticket: RunTicket, events: mpsc::UnboundedSender<RunEvent>) {
        let connection = match self.resolver.resolve(ticket.account).await {
            Ok(connection) => connection,
            Err(e) => {
                let _ = events.send(RunEvent::Failed(ticket, e));
                return;
            }
        };
        let _ = events.send(RunEvent::Resolved(ticket, connection.clone()));

        let switch_events = events.clone();
        let verified = match self
            .guard
            .ensure_with(&connection, move || {
                let _ = switch_events.send(RunEvent::SwitchRequested(ticket));
            })
            .await
        {
            Ok(verified) => verified,
            Err(e) => {
                let _ = events.send(RunEvent::Failed(ticket, e));
                return;
            }
        };
        let _ = events.send(RunEvent::Verified(ticket, verified.clone()));

        let result = self.synchronizer.sync(&verified).await;
        let _ = events.send(RunEvent::Synced(ticket, result));
    }

    pub async fn transfer(
        self: Arc<Self>,
        ticket: RunTicket,
        verified: VerifiedConnection,
        request: TransferRequest,
        events: mpsc::UnboundedSender<RunEvent>,
    ) {
        let result = self.submitter.submit(&verified, &request).await;
        if let Ok(receipt) = &result {
            info!(tx_hash = %receipt.tx_hash, "transfer confirmed");
        }
        let _ = events.send(RunEvent::TransferFinished(ticket, result));
    }

    pub async fn resync(
        self: Arc<Self>,
        ticket: RunTicket,
        verified: VerifiedConnection,
        events: mpsc::UnboundedSender<RunEvent>,
    ) {
        let result = self.synchronizer.sync(&verified).await;
        let _ = events.send(RunEvent::Synced(ticket, result));
    }
}
