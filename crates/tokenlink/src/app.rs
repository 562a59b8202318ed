//! Widget state and update loop

use std::time::Duration;

use eframe::egui;
use tokenlink_adapters::WidgetConfig;
use tokenlink_core::{GuardMode, PipelinePhase, SessionHandle, TransferRequest, WidgetView};

use crate::ui;

pub struct App {
    handle: SessionHandle,
    view: WidgetView,
    guard_mode: GuardMode,
    network_name: String,
    native_symbol: String,
    token_name: String,
    token_decimals: u8,
    explorer_url: Option<String>,
    recipient: String,
    amount: String,
}

impl App {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: WidgetConfig,
        handle: SessionHandle,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        // Wake the UI whenever the session publishes a new view.
        let ctx = cc.egui_ctx.clone();
        let mut views = handle.watch();
        runtime.spawn(async move {
            while views.changed().await.is_ok() {
                ctx.request_repaint();
            }
        });

        Self {
            view: handle.view(),
            handle,
            guard_mode: config.guard_mode,
            network_name: config.network.name.clone(),
            native_symbol: config.network.native_currency.symbol.clone(),
            token_name: config.token.name.clone(),
            token_decimals: config.token.decimals,
            explorer_url: config.network.block_explorer_urls.first().cloned(),
            recipient: String::new(),
            amount: String::new(),
        }
    }
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.set_visuals(egui::Visuals::dark());
        self.view = self.handle.view();

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(8.0);
            ui.horizontal(|ui| {
                ui::styled_heading(ui, "TokenLink");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    self.render_connect_button(ui);
                });
            });
            ui.add_space(4.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                self.render_status(ui);
                self.render_error(ui);
                if self.view.account.is_some() {
                    self.render_balances(ui);
                    self.render_transfer(ui);
                }
                self.render_last_receipt(ui);
            });
        });

        if self.view.phase.is_active() || self.view.transfer_pending {
            ctx.request_repaint_after(Duration::from_millis(250));
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.handle.shutdown();
    }
}

impl App {
    fn render_connect_button(&mut self, ui: &mut egui::Ui) {
        if self.view.phase == PipelinePhase::Idle {
            if ui.button("Connect wallet").clicked() {
                self.handle.connect();
            }
        } else if ui.button("Disconnect").clicked() {
            self.handle.disconnect();
        }
    }

    fn render_status(&mut self, ui: &mut egui::Ui) {
        ui.add_space(10.0);
        ui.horizontal(|ui| {
            if self.view.phase.is_active() {
                ui.spinner();
            }
            ui.label(egui::RichText::new(ui::phase_text(self.view.phase)).strong());
        });
        if let Some(account) = self.view.account {
            ui.horizontal(|ui| {
                ui.label("Account:");
                let text = account.to_string();
                ui.monospace(ui::short_hex(&text)).on_hover_text(&text);
                if ui.small_button("Copy").clicked() {
                    ui.ctx().copy_text(text);
                }
            });
        }
        if let Some(network) = &self.view.network {
            ui.label(format!("Network: {} ({})", network.name, network.chain_id));
        }
    }

    fn render_error(&mut self, ui: &mut egui::Ui) {
        if self.view.wrong_network() {
            ui.add_space(6.0);
            ui.colored_label(
                ui::WARN,
                format!("Please switch your wallet to {}.", self.network_name),
            );
            if ui.button(ui::network_action_label(self.guard_mode)).clicked() {
                self.handle.retry();
            }
        }
        let Some(err) = &self.view.error else {
            return;
        };
        ui.add_space(6.0);
        ui.colored_label(ui::ERROR, err.to_string());
        if matches!(self.view.phase, PipelinePhase::Failed(_)) && !self.view.wrong_network() {
            if ui.button("Retry").clicked() {
                self.handle.retry();
            }
        }
    }

    fn render_balances(&mut self, ui: &mut egui::Ui) {
        ui::section_header(ui, "Balances");
        match &self.view.snapshot {
            Some(snapshot) => {
                egui::Grid::new("balances").num_columns(2).show(ui, |ui| {
                    ui.label(&self.native_symbol);
                    ui.monospace(&snapshot.native_amount);
                    ui.end_row();
                    ui.label(&self.token_name);
                    ui.monospace(&snapshot.token_amount);
                    ui.end_row();
                });
            }
            None if self.view.phase == PipelinePhase::Syncing => {
                ui.spinner();
            }
            None => {
                ui.weak("No balances loaded.");
            }
        }
    }

    fn render_transfer(&mut self, ui: &mut egui::Ui) {
        ui::section_header(ui, &format!("Send {}", self.token_name));
        egui::Grid::new("transfer").num_columns(2).show(ui, |ui| {
            ui.label("Recipient:");
            ui::address_input(ui, &mut self.recipient);
            ui.end_row();
            ui.label("Amount:");
            let hint = format!("up to {} decimals", self.token_decimals);
            ui::amount_input(ui, &mut self.amount, &hint);
            ui.end_row();
        });

        ui.add_space(6.0);
        let filled = !self.recipient.trim().is_empty() && !self.amount.trim().is_empty();
        ui.horizontal(|ui| {
            let send = ui.add_enabled(
                self.view.can_submit() && filled,
                egui::Button::new(format!("Send {}", self.token_name)),
            );
            if send.clicked() {
                self.handle.submit(TransferRequest {
                    recipient: self.recipient.trim().to_owned(),
                    amount: self.amount.trim().to_owned(),
                });
            }
            if self.view.transfer_pending {
                ui.spinner();
                ui.label("Waiting for confirmation...");
            }
        });
    }

    fn render_last_receipt(&mut self, ui: &mut egui::Ui) {
        let Some(receipt) = &self.view.last_receipt else {
            return;
        };
        ui::section_header(ui, "Last transfer");
        ui.label(format!(
            "Sent {} {} to {}",
            receipt.amount,
            self.token_name,
            ui::short_hex(&receipt.recipient.to_string())
        ));
        let hash = receipt.tx_hash.to_string();
        match &self.explorer_url {
            Some(base) => {
                let url = format!("{}/tx/{hash}", base.trim_end_matches('/'));
                ui.hyperlink_to(ui::short_hex(&hash), url);
            }
            None => {
                ui.monospace(ui::short_hex(&hash));
            }
        }
        if let Some(block) = receipt.block_number {
            ui.weak(format!("Included in block {block}"));
        }
    }
}
