use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::controller::{PipelineController, RunReason, TransferOutcome, WidgetView};
use crate::domain::{TransferRequest, TransportKind};
use crate::pipeline::{Pipeline, RunEvent};
use crate::ports::{Subscription, WalletEvent};

#[derive(Debug, Clone)]
pub enum SessionCommand {
    Connect,
    Disconnect,
    Retry,
    Submit(TransferRequest),
    Shutdown,
}

/// Cloneable front for a running [`SessionObserver`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    view: watch::Receiver<WidgetView>,
}

impl SessionHandle {
    pub fn connect(&self) {
        self.send(SessionCommand::Connect);
    }

    pub fn disconnect(&self) {
        self.send(SessionCommand::Disconnect);
    }

    pub fn retry(&self) {
        self.send(SessionCommand::Retry);
    }

    pub fn submit(&self, request: TransferRequest) {
        self.send(SessionCommand::Submit(request));
    }

    pub fn shutdown(&self) {
        self.send(SessionCommand::Shutdown);
    }

    pub fn view(&self) -> WidgetView {
        self.view.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<WidgetView> {
        self.view.clone()
    }

    fn send(&self, command: SessionCommand) {
        if self.commands.send(command).is_err() {
            warn!("session observer is gone; command dropped");
        }
    }
}

/// Actor that owns the controller and re-drives the pipeline on wallet
/// events and user commands.
pub struct SessionObserver {
    pipeline: Arc<Pipeline>,
    controller: PipelineController,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    run_tx: mpsc::UnboundedSender<RunEvent>,
    run_rx: mpsc::UnboundedReceiver<RunEvent>,
    wallet_events: Option<mpsc::UnboundedReceiver<WalletEvent>>,
    subscription: Option<Subscription>,
    view: watch::Sender<WidgetView>,
}

enum Step {
    Command(Option<SessionCommand>),
    Wallet(WalletEvent),
    Run(RunEvent),
}

impl SessionObserver {
    pub fn new(pipeline: Pipeline) -> (Self, SessionHandle) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (run_tx, run_rx) = mpsc::unbounded_channel();
        let (view, view_rx) = watch::channel(WidgetView::default());
        let observer = Self {
            pipeline: Arc::new(pipeline),
            controller: PipelineController::new(),
            commands,
            run_tx,
            run_rx,
            wallet_events: None,
            subscription: None,
            view,
        };
        let handle = SessionHandle {
            commands: commands_tx,
            view: view_rx,
        };
        (observer, handle)
    }

    pub fn spawn(pipeline: Pipeline) -> (JoinHandle<()>, SessionHandle) {
        let (observer, handle) = Self::new(pipeline);
        (tokio::spawn(observer.run()), handle)
    }

    pub async fn run(mut self) {
        loop {
            // Run progress is drained before wallet events so a switch echo
            // is seen after the matching SwitchRequested.
            let step = tokio::select! {
                biased;
                command = self.commands.recv() => Step::Command(command),
                Some(event) = self.run_rx.recv() => Step::Run(event),
                Some(event) = next_wallet_event(&mut self.wallet_events) => Step::Wallet(event),
            };
            match step {
                Step::Command(None) | Step::Command(Some(SessionCommand::Shutdown)) => break,
                Step::Command(Some(command)) => self.on_command(command),
                Step::Wallet(event) => self.on_wallet_event(event),
                Step::Run(event) => self.on_run_event(event),
            }
            self.publish();
        }
        self.unsubscribe();
        info!("session observer stopped");
    }

    fn on_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Connect => self.start_run(None, RunReason::Connect),
            SessionCommand::Retry => {
                let account = self.controller.account();
                self.start_run(account, RunReason::Retry);
            }
            SessionCommand::Disconnect => self.disconnect(),
            SessionCommand::Submit(request) => match self.controller.begin_transfer() {
                Ok((ticket, verified)) => {
                    tokio::spawn(self.pipeline.clone().transfer(
                        ticket,
                        verified,
                        request,
                        self.run_tx.clone(),
                    ));
                }
                Err(e) => {
                    warn!(error = %e, "transfer not submitted");
                    self.controller.note_error(e);
                }
            },
            SessionCommand::Shutdown => {}
        }
    }

    fn on_wallet_event(&mut self, event: WalletEvent) {
        match event {
            WalletEvent::AccountsChanged(accounts) => match accounts.first().copied() {
                None => {
                    info!("wallet exposes no accounts, resetting session");
                    self.unsubscribe();
                    self.controller.reset();
                }
                Some(account)
                    if Some(account) == self.controller.account()
                        && (self.controller.phase().is_active()
                            || self.controller.verified().is_some()) =>
                {
                    debug!(%account, "accountsChanged for active account ignored");
                }
                Some(account) => {
                    info!(%account, "active account changed");
                    self.start_run(Some(account), RunReason::AccountChanged);
                }
            },
            WalletEvent::ChainChanged(chain_id) => {
                let expected = self.pipeline.guard.network().chain_id;
                if self.controller.is_own_switch(chain_id, expected) {
                    debug!(chain_id, "chainChanged echo of our own switch");
                    return;
                }
                info!(chain_id, "chain changed outside the pipeline, rerunning");
                let account = self.controller.account();
                self.start_run(account, RunReason::ChainChanged);
            }
            WalletEvent::Disconnected => {
                info!("wallet disconnected");
                self.unsubscribe();
                self.controller.reset();
            }
        }
    }

    fn on_run_event(&mut self, event: RunEvent) {
        match event {
            RunEvent::Resolved(ticket, connection) => {
                let transport = connection.transport().clone();
                if self.controller.on_resolved(ticket, connection) {
                    self.unsubscribe();
                    let (tx, rx) = mpsc::unbounded_channel();
                    match transport.subscribe(tx) {
                        Ok(subscription) => {
                            self.subscription = Some(subscription);
                            self.wallet_events = Some(rx);
                        }
                        Err(e) => warn!(error = %e, "wallet event subscription failed"),
                    }
                }
            }
            RunEvent::SwitchRequested(ticket) => {
                self.controller.on_switch_requested(ticket);
            }
            RunEvent::Verified(ticket, verified) => {
                self.controller.on_verified(ticket, verified);
            }
            RunEvent::Synced(ticket, result) => {
                self.controller.on_synced(ticket, result);
            }
            RunEvent::Failed(ticket, err) => {
                self.controller.on_failed(ticket, err);
            }
            RunEvent::TransferFinished(ticket, result) => {
                if self.controller.on_transfer_finished(ticket, result)
                    == TransferOutcome::Confirmed
                {
                    if let Some(verified) = self.controller.verified().cloned() {
                        tokio::spawn(self.pipeline.clone().resync(
                            ticket,
                            verified,
                            self.run_tx.clone(),
                        ));
                    }
                }
            }
        }
    }

    fn start_run(&mut self, account: Option<alloy::primitives::Address>, reason: RunReason) {
        let ticket = self.controller.begin_run(account, reason);
        tokio::spawn(self.pipeline.clone().run(ticket, self.run_tx.clone()));
    }

    fn disconnect(&mut self) {
        if let Some(connection) = self.controller.connection().cloned() {
            let remote = self.pipeline.resolver.remote().clone();
            tokio::spawn(async move {
                let result = match connection.kind() {
                    TransportKind::RemoteSession => remote.disconnect().await,
                    TransportKind::Injected => connection.transport().disconnect().await,
                };
                if let Err(e) = result {
                    warn!(error = %e, "wallet disconnect failed");
                }
            });
        }
        self.unsubscribe();
        self.controller.reset();
        info!("session disconnected");
    }

    fn unsubscribe(&mut self) {
        self.wallet_events = None;
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }

    fn publish(&self) {
        self.view.send_replace(self.controller.view());
    }
}

async fn next_wallet_event(
    rx: &mut Option<mpsc::UnboundedReceiver<WalletEvent>>,
) -> Option<WalletEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
