//! Small shared widgets.

use eframe::egui;

use tokenlink_core::{GuardMode, Phase, PipelinePhase};

pub const ACCENT: egui::Color32 = egui::Color32::from_rgb(130, 71, 229);
pub const WARN: egui::Color32 = egui::Color32::from_rgb(230, 160, 40);
pub const ERROR: egui::Color32 = egui::Color32::from_rgb(220, 80, 80);

pub fn styled_heading(ui: &mut egui::Ui, text: &str) {
    ui.heading(egui::RichText::new(text).color(ACCENT));
}

pub fn section_header(ui: &mut egui::Ui, text: &str) {
    ui.add_space(10.0);
    ui.label(egui::RichText::new(text).strong().size(14.0));
    ui.separator();
}

pub fn address_input(ui: &mut egui::Ui, value: &mut String) -> egui::Response {
    ui.add(
        egui::TextEdit::singleline(value)
            .hint_text("0x...")
            .desired_width(360.0)
            .font(egui::TextStyle::Monospace),
    )
}

pub fn amount_input(ui: &mut egui::Ui, value: &mut String, hint: &str) -> egui::Response {
    ui.add(
        egui::TextEdit::singleline(value)
            .hint_text(hint)
            .desired_width(150.0)
            .font(egui::TextStyle::Monospace),
    )
}

/// Abbreviates `0x1234...abcd`.
pub fn short_hex(value: &str) -> String {
    if value.len() <= 12 {
        return value.to_owned();
    }
    format!("{}...{}", &value[..6], &value[value.len() - 4..])
}

pub fn phase_text(phase: PipelinePhase) -> &'static str {
    match phase {
        PipelinePhase::Idle => "Not connected",
        PipelinePhase::Resolving => "Connecting wallet...",
        PipelinePhase::Verifying => "Checking network...",
        PipelinePhase::Switching => "Waiting for network switch...",
        PipelinePhase::Syncing => "Loading balances...",
        PipelinePhase::Ready => "Connected",
        PipelinePhase::Failed(Phase::Resolve) => "Wallet unavailable",
        PipelinePhase::Failed(Phase::VerifyNetwork | Phase::SwitchNetwork) => "Wrong network",
        PipelinePhase::Failed(Phase::FetchBalance) => "Balances unavailable",
        PipelinePhase::Failed(Phase::SubmitTransfer) => "Transfer failed",
    }
}

/// Wrong-network action. Report-only guards never switch, they re-check.
pub fn network_action_label(mode: GuardMode) -> &'static str {
    match mode {
        GuardMode::AutoSwitch => "Switch network",
        GuardMode::ReportOnly => "Check again",
    }
}
