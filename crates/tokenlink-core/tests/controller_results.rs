use std::sync::Arc;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use tokenlink_core::{
    BalanceSnapshot, Connection, Eip1193Provider, GuardMode, NetworkDescriptor, NetworkGuard,
    ObservedNetwork, Phase, PipelineController, PipelineError, PipelinePhase, PortError,
    RunReason, Subscription, TransferOutcome, TransferReceipt, TransportKind, VerifiedConnection,
    WalletEvent,
};

struct PolygonStub;

#[async_trait]
impl Eip1193Provider for PolygonStub {
    async fn request(&self, method: &str, _params: Value) -> Result<Value, PortError> {
        match method {
            "eth_chainId" => Ok(Value::String("0x89".to_owned())),
            _ => Err(PortError::NotImplemented("stub")),
        }
    }

    fn subscribe(
        &self,
        _sink: mpsc::UnboundedSender<WalletEvent>,
    ) -> Result<Subscription, PortError> {
        Ok(Subscription::new(|| {}))
    }

    async fn disconnect(&self) -> Result<(), PortError> {
        Ok(())
    }
}

fn account(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

fn connection(owner: Address) -> Connection {
    Connection::new(TransportKind::Injected, Arc::new(PolygonStub), owner)
}

async fn verified(owner: Address) -> VerifiedConnection {
    NetworkGuard::new(NetworkDescriptor::polygon(), GuardMode::AutoSwitch)
        .ensure(&connection(owner))
        .await
        .expect("stub is on polygon")
}

fn snapshot(owner: Address, token_raw: u64) -> BalanceSnapshot {
    BalanceSnapshot {
        account: owner,
        native_amount: "0.0".to_owned(),
        token_amount: "1.5".to_owned(),
        native_raw: U256::ZERO,
        token_raw: U256::from(token_raw),
        network: ObservedNetwork {
            chain_id: 137,
            name: "Polygon Mainnet".to_owned(),
        },
    }
}

async fn drive_to_ready(ctl: &mut PipelineController, owner: Address, token_raw: u64) {
    let ticket = ctl.begin_run(Some(owner), RunReason::AccountChanged);
    assert!(ctl.on_resolved(ticket, connection(owner)));
    assert!(ctl.on_verified(ticket, verified(owner).await));
    assert!(ctl.on_synced(ticket, Ok(snapshot(owner, token_raw))));
    assert_eq!(ctl.phase(), PipelinePhase::Ready);
}

#[tokio::test]
async fn superseded_run_cannot_overwrite_newer_snapshot() {
    let (a, b) = (account(0xaa), account(0xbb));
    let mut ctl = PipelineController::new();

    let run_a = ctl.begin_run(Some(a), RunReason::AccountChanged);
    assert!(ctl.on_resolved(run_a, connection(a)));

    let run_b = ctl.begin_run(Some(b), RunReason::AccountChanged);
    assert!(ctl.on_resolved(run_b, connection(b)));
    assert!(ctl.on_verified(run_b, verified(b).await));
    assert!(ctl.on_synced(run_b, Ok(snapshot(b, 2))));

    // run A finishes late
    assert!(!ctl.on_verified(run_a, verified(a).await));
    assert!(!ctl.on_synced(run_a, Ok(snapshot(a, 1))));
    assert!(!ctl.on_failed(run_a, PipelineError::new(Phase::FetchBalance, "late")));

    let view = ctl.view();
    assert_eq!(view.account, Some(b));
    assert_eq!(view.snapshot.expect("snapshot").token_raw, U256::from(2u8));
    assert_eq!(view.phase, PipelinePhase::Ready);
    assert!(view.error.is_none());
}

#[tokio::test]
async fn failed_sync_keeps_previous_snapshot() {
    let owner = account(0x11);
    let mut ctl = PipelineController::new();
    drive_to_ready(&mut ctl, owner, 7).await;

    let retry = ctl.begin_run(None, RunReason::Retry);
    assert_eq!(retry.account, Some(owner));
    assert!(ctl.on_resolved(retry, connection(owner)));
    assert!(ctl.on_verified(retry, verified(owner).await));
    assert!(ctl.on_synced(
        retry,
        Err(PipelineError::new(Phase::FetchBalance, "rpc down"))
    ));

    let view = ctl.view();
    assert_eq!(view.phase, PipelinePhase::Failed(Phase::FetchBalance));
    assert_eq!(view.snapshot.expect("kept").token_raw, U256::from(7u8));
    assert_eq!(view.error.expect("error").message, "rpc down");
}

#[tokio::test]
async fn account_or_chain_change_clears_snapshot() {
    let owner = account(0x11);
    let mut ctl = PipelineController::new();
    drive_to_ready(&mut ctl, owner, 7).await;

    ctl.begin_run(Some(owner), RunReason::ChainChanged);
    assert!(ctl.snapshot().is_none());
    assert_eq!(ctl.account(), Some(owner));

    drive_to_ready(&mut ctl, owner, 7).await;
    ctl.begin_run(Some(account(0x22)), RunReason::AccountChanged);
    assert!(ctl.snapshot().is_none());
    assert!(ctl.connection().is_none());
}

#[tokio::test]
async fn transfer_requires_ready_and_is_not_queued() {
    let owner = account(0x11);
    let mut ctl = PipelineController::new();
    assert!(ctl.begin_transfer().is_err());

    drive_to_ready(&mut ctl, owner, 7).await;
    let (ticket, conn) = ctl.begin_transfer().expect("ready");
    assert_eq!(conn.account(), owner);
    let second = ctl.begin_transfer().expect_err("pending");
    assert_eq!(second.phase, Phase::SubmitTransfer);

    let receipt = TransferReceipt {
        tx_hash: Default::default(),
        block_number: Some(1),
        recipient: account(0x22),
        amount_raw: U256::from(2_500_000u64),
        amount: "2.5".to_owned(),
    };
    assert_eq!(
        ctl.on_transfer_finished(ticket, Ok(receipt)),
        TransferOutcome::Confirmed
    );
    assert_eq!(ctl.phase(), PipelinePhase::Syncing);
    assert!(ctl.on_synced(ticket, Ok(snapshot(owner, 5))));
    assert_eq!(ctl.phase(), PipelinePhase::Ready);
    assert!(ctl.view().last_receipt.is_some());
}

#[tokio::test]
async fn disconnect_drops_in_flight_transfer() {
    let owner = account(0x11);
    let mut ctl = PipelineController::new();
    drive_to_ready(&mut ctl, owner, 7).await;
    let (ticket, _) = ctl.begin_transfer().expect("ready");

    ctl.reset();
    assert_eq!(
        ctl.on_transfer_finished(
            ticket,
            Err(PipelineError::new(Phase::SubmitTransfer, "late"))
        ),
        TransferOutcome::Stale
    );
    let view = ctl.view();
    assert_eq!(view.phase, PipelinePhase::Idle);
    assert!(view.error.is_none());
    assert!(view.account.is_none());
}

#[tokio::test]
async fn own_switch_echo_is_recognised() {
    let owner = account(0x11);
    let mut ctl = PipelineController::new();
    let ticket = ctl.begin_run(Some(owner), RunReason::Connect);
    assert!(ctl.on_resolved(ticket, connection(owner)));
    assert!(ctl.on_switch_requested(ticket));
    assert!(ctl.is_own_switch(137, 137));
    assert!(!ctl.is_own_switch(1, 137));
}

#[test]
fn target_chain_read_while_verifying_is_not_external() {
    let owner = account(0x11);
    let mut ctl = PipelineController::new();
    assert!(!ctl.is_own_switch(137, 137));
    let ticket = ctl.begin_run(Some(owner), RunReason::Connect);
    assert!(!ctl.is_own_switch(137, 137));
    assert!(ctl.on_resolved(ticket, connection(owner)));
    assert_eq!(ctl.phase(), PipelinePhase::Verifying);
    assert!(ctl.is_own_switch(137, 137));
    assert!(!ctl.is_own_switch(1, 137));
}
