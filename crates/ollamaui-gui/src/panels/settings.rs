use std::sync::mpsc::{Receiver, TryRecvError};

use eframe::egui;
use ollamaui_services::{AppConfig, Services, StatusReport};

pub struct SettingsPanel {
    // Form state
    draft: AppConfig,
    save_status: Option<Result<String, String>>,

    // Status
    status: Option<StatusReport>,
    status_rx: Option<Receiver<StatusReport>>,
}

impl SettingsPanel {
    pub fn new(config: AppConfig) -> Self {
        Self {
            draft: config,
            save_status: None,
            status: None,
            status_rx: None,
        }
    }

    pub fn check_status(&mut self, services: &Services) {
        self.status_rx = Some(services.status.check());
    }

    pub fn poll(&mut self) {
        let Some(rx) = self.status_rx.take() else { return };
        match rx.try_recv() {
            Ok(report) => self.status = Some(report),
            Err(TryRecvError::Empty) => self.status_rx = Some(rx),
            Err(TryRecvError::Disconnected) => {}
        }
    }

    pub fn ui(&mut self, ui: &mut egui::Ui, services: &Services) {
        ui.label(egui::RichText::new("Settings").heading().color(egui::Color32::GRAY));
        ui.add_space(10.0);

        egui::ScrollArea::vertical().show(ui, |ui| {
            self.render_status(ui, services);
            ui.add_space(20.0);

            self.render_config(ui, services);
        });
    }

    fn render_status(&mut self, ui: &mut egui::Ui, services: &Services) {
        ui.label(egui::RichText::new("Ollama").strong());
        ui.add_space(5.0);

        ui.horizontal(|ui| {
            let checking = self.status_rx.is_some();
            if ui.add_enabled(!checking, egui::Button::new("Check Status")).clicked() {
                self.check_status(services);
            }
            if checking {
                ui.spinner();
            }
        });

        let Some(report) = &self.status else { return };

        if report.status.running {
            ui.label(
                egui::RichText::new(format!(
                    "Running: {}",
                    report.status.version.as_deref().unwrap_or("unknown version")
                ))
                .color(egui::Color32::GREEN),
            );
        } else {
            ui.label(
                egui::RichText::new(format!(
                    "Not available: {}",
                    report.status.error.as_deref().unwrap_or("unknown error")
                ))
                .color(egui::Color32::RED),
            );
        }

        ui.label(format!("Response time: {} ms", report.response_time.as_millis()));
        if let Some(path) = report.info.as_ref().and_then(|i| i.models_path.as_deref()) {
            ui.label(format!("Models path: {path}"));
        }

        ui.label(format!("Processes: {}", report.processes.len()));
        for process in &report.processes {
            ui.label(egui::RichText::new(process).small().monospace());
        }
    }

    fn render_config(&mut self, ui: &mut egui::Ui, services: &Services) {
        ui.label(egui::RichText::new("Configuration").strong());
        ui.add_space(5.0);

        egui::Grid::new("settings_grid").num_columns(2).spacing([10.0, 6.0]).show(ui, |ui| {
            ui.label("Ollama binary:");
            ui.text_edit_singleline(&mut self.draft.ollama.binary);
            ui.end_row();

            ui.label("Default chat model:");
            ui.text_edit_singleline(&mut self.draft.chat.default_model);
            ui.end_row();

            ui.label("History limit:");
            ui.add(egui::DragValue::new(&mut self.draft.terminal.history_limit).range(1..=10_000));
            ui.end_row();

            ui.label("Scrollback lines:");
            ui.add(egui::DragValue::new(&mut self.draft.terminal.scrollback).range(100..=100_000));
            ui.end_row();

            ui.label("Prompt delay (ms):");
            ui.add(egui::DragValue::new(&mut self.draft.terminal.prompt_delay_ms).range(0..=5_000));
            ui.end_row();

            ui.label("Finished pull linger (ms):");
            ui.add(egui::DragValue::new(&mut self.draft.pull.linger_ms).range(0..=60_000));
            ui.end_row();
        });

        ui.add_space(5.0);
        ui.horizontal(|ui| {
            if ui.button("Save").clicked() {
                self.save_status = Some(
                    self.draft
                        .save()
                        .map(|path| format!("Saved to {}. Restart to apply.", path.display()))
                        .map_err(|e| e.to_string()),
                );
            }
            if ui.button("Revert").clicked() {
                self.draft = services.config().clone();
                self.save_status = None;
            }
        });

        match &self.save_status {
            Some(Ok(message)) => {
                ui.label(egui::RichText::new(message).color(egui::Color32::GREEN));
            }
            Some(Err(error)) => {
                ui.label(egui::RichText::new(error).color(egui::Color32::RED));
            }
            None => {}
        }
    }
}
