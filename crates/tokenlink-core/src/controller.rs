use alloy::primitives::Address;
use tracing::{debug, warn};

use crate::connection::{Connection, VerifiedConnection};
use crate::domain::{BalanceSnapshot, TransferReceipt};
use crate::error::{Phase, PipelineError};
use crate::state_machine::{transition, PipelineAction, PipelinePhase};

/// Identifies the run a result belongs to. Results carrying an outdated
/// ticket are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTicket {
    pub generation: u64,
    pub account: Option<Address>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunReason {
    Connect,
    AccountChanged,
    ChainChanged,
    Retry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Stale,
    Failed,
    Confirmed,
}

/// What the UI renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetView {
    pub phase: PipelinePhase,
    pub account: Option<Address>,
    pub network: Option<crate::domain::ObservedNetwork>,
    pub snapshot: Option<BalanceSnapshot>,
    pub error: Option<PipelineError>,
    pub transfer_pending: bool,
    pub last_receipt: Option<TransferReceipt>,
}

impl Default for WidgetView {
    fn default() -> Self {
        Self {
            phase: PipelinePhase::Idle,
            account: None,
            network: None,
            snapshot: None,
            error: None,
            transfer_pending: false,
            last_receipt: None,
        }
    }
}

impl WidgetView {
    pub fn wrong_network(&self) -> bool {
        matches!(
            self.error.as_ref().map(|e| e.phase),
            Some(Phase::VerifyNetwork | Phase::SwitchNetwork)
        )
    }

    pub fn can_submit(&self) -> bool {
        self.phase == PipelinePhase::Ready && !self.transfer_pending
    }
}

/// Single owner of the displayed state for one wallet session.
#[derive(Debug)]
pub struct PipelineController {
    generation: u64,
    phase: PipelinePhase,
    account: Option<Address>,
    connection: Option<Connection>,
    verified: Option<VerifiedConnection>,
    snapshot: Option<BalanceSnapshot>,
    error: Option<PipelineError>,
    transfer_pending: bool,
    last_receipt: Option<TransferReceipt>,
}

impl Default for PipelineController {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineController {
    pub fn new() -> Self {
        Self {
            generation: 0,
            phase: PipelinePhase::Idle,
            account: None,
            connection: None,
            verified: None,
            snapshot: None,
            error: None,
            transfer_pending: false,
            last_receipt: None,
        }
    }

    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    pub fn account(&self) -> Option<Address> {
        self.account
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    pub fn verified(&self) -> Option<&VerifiedConnection> {
        self.verified.as_ref()
    }

    pub fn snapshot(&self) -> Option<&BalanceSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn error(&self) -> Option<&PipelineError> {
        self.error.as_ref()
    }

    /// Starts a fresh run; anything still in flight becomes stale.
    pub fn begin_run(&mut self, requested: Option<Address>, reason: RunReason) -> RunTicket {
        self.generation = self.generation.saturating_add(1);
        let account = match reason {
            RunReason::Connect | RunReason::AccountChanged => requested,
            RunReason::ChainChanged | RunReason::Retry => requested.or(self.account),
        };
        // Balances are bound to the old account/chain and cannot be reused.
        if reason == RunReason::ChainChanged || account != self.account {
            self.snapshot = None;
        }
        self.account = account;
        self.connection = None;
        self.verified = None;
        self.error = None;
        self.transfer_pending = false;
        self.phase = PipelinePhase::Resolving;
        debug!(generation = self.generation, ?reason, ?account, "pipeline run started");
        RunTicket {
            generation: self.generation,
            account,
        }
    }

    pub fn reset(&mut self) {
        self.generation = self.generation.saturating_add(1);
        self.phase = PipelinePhase::Idle;
        self.account = None;
        self.connection = None;
        self.verified = None;
        self.snapshot = None;
        self.error = None;
        self.transfer_pending = false;
        self.last_receipt = None;
    }

    pub fn is_current(&self, ticket: RunTicket) -> bool {
        ticket.generation == self.generation
            && match (ticket.account, self.account) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
    }

    pub fn on_resolved(&mut self, ticket: RunTicket, connection: Connection) -> bool {
        if !self.accept(ticket, "resolved") {
            return false;
        }
        if !self.advance(PipelineAction::Resolved) {
            return false;
        }
        self.account = Some(connection.account());
        self.connection = Some(connection);
        true
    }

    pub fn on_switch_requested(&mut self, ticket: RunTicket) -> bool {
        self.accept(ticket, "switch") && self.advance(PipelineAction::SwitchRequested)
    }

    pub fn on_verified(&mut self, ticket: RunTicket, verified: VerifiedConnection) -> bool {
        if !self.accept(ticket, "verified") || !self.advance(PipelineAction::NetworkConfirmed) {
            return false;
        }
        self.verified = Some(verified);
        true
    }

    /// Applies a sync result. On failure the previous snapshot stays.
    pub fn on_synced(
        &mut self,
        ticket: RunTicket,
        result: Result<BalanceSnapshot, PipelineError>,
    ) -> bool {
        if !self.accept(ticket, "synced") {
            return false;
        }
        match result {
            Ok(snapshot) => {
                if Some(snapshot.account) != self.account {
                    warn!(account = %snapshot.account, "dropping snapshot for another account");
                    return false;
                }
                if !self.advance(PipelineAction::Synced) {
                    return false;
                }
                self.snapshot = Some(snapshot);
                self.error = None;
                true
            }
            Err(err) => self.fail(err),
        }
    }

    pub fn on_failed(&mut self, ticket: RunTicket, err: PipelineError) -> bool {
        if !self.accept(ticket, "failed") {
            return false;
        }
        self.fail(err)
    }

    /// Hands out the verified connection for a transfer.
    pub fn begin_transfer(&mut self) -> Result<(RunTicket, VerifiedConnection), PipelineError> {
        if self.transfer_pending {
            return Err(PipelineError::new(
                Phase::SubmitTransfer,
                "a transfer is already pending",
            ));
        }
        let verified = match (self.phase, &self.verified) {
            (PipelinePhase::Ready, Some(verified)) => verified.clone(),
            _ => {
                return Err(PipelineError::new(
                    Phase::SubmitTransfer,
                    "wallet is not connected to the expected network",
                ))
            }
        };
        self.transfer_pending = true;
        self.error = None;
        Ok((
            RunTicket {
                generation: self.generation,
                account: self.account,
            },
            verified,
        ))
    }

    pub fn on_transfer_finished(
        &mut self,
        ticket: RunTicket,
        result: Result<TransferReceipt, PipelineError>,
    ) -> TransferOutcome {
        if !self.accept(ticket, "transfer") {
            return TransferOutcome::Stale;
        }
        self.transfer_pending = false;
        match result {
            Ok(receipt) => {
                self.last_receipt = Some(receipt);
                if self.advance(PipelineAction::Resync) {
                    TransferOutcome::Confirmed
                } else {
                    TransferOutcome::Failed
                }
            }
            Err(err) => {
                self.error = Some(err);
                TransferOutcome::Failed
            }
        }
    }

    /// Records an error that does not end the run (rejected user action).
    pub fn note_error(&mut self, err: PipelineError) {
        self.error = Some(err);
    }

    /// True when `chain_id` is the wallet echoing the guard's own switch or
    /// confirming the chain the guard is still verifying.
    pub fn is_own_switch(&self, chain_id: u64, expected_chain_id: u64) -> bool {
        chain_id == expected_chain_id
            && (matches!(
                self.phase,
                PipelinePhase::Verifying | PipelinePhase::Switching
            )
                || self
                    .verified
                    .as_ref()
                    .is_some_and(|v| v.network().chain_id == chain_id))
    }

    pub fn view(&self) -> WidgetView {
        WidgetView {
            phase: self.phase,
            account: self.account,
            network: self.verified.as_ref().map(|v| v.network().clone()),
            snapshot: self.snapshot.clone(),
            error: self.error.clone(),
            transfer_pending: self.transfer_pending,
            last_receipt: self.last_receipt.clone(),
        }
    }

    fn accept(&self, ticket: RunTicket, what: &'static str) -> bool {
        if self.is_current(ticket) {
            return true;
        }
        debug!(
            what,
            ticket = ticket.generation,
            current = self.generation,
            "discarding stale run result"
        );
        false
    }

    fn advance(&mut self, action: PipelineAction) -> bool {
        match transition(self.phase, action) {
            Ok(next) => {
                self.phase = next;
                true
            }
            Err(e) => {
                warn!(error = %e, "rejected pipeline transition");
                false
            }
        }
    }

    fn fail(&mut self, err: PipelineError) -> bool {
        if !self.advance(PipelineAction::Fail(err.phase)) {
            return false;
        }
        warn!(phase = %err.phase, message = %err.message, "pipeline run failed");
        self.error = Some(err);
        true
    }
}
