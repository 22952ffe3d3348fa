use std::sync::mpsc::Receiver;

use eframe::egui;
use ollamaui_services::{AppAction, AppState, ModelEvent, ModelService, Services};

const TEMPLATE: &str = "FROM llama3:latest\n\nPARAMETER temperature 0.7\n\nSYSTEM \"\"\"\nYou are a helpful assistant.\n\"\"\"\n";

pub struct CreatePanel {
    name: String,
    modelfile: String,
    rx: Vec<Receiver<ModelEvent>>,
    pending: Option<String>,
    outcome: Option<Result<String, String>>,
}

impl CreatePanel {
    pub fn new() -> Self {
        Self {
            name: String::new(),
            modelfile: TEMPLATE.to_string(),
            rx: Vec::new(),
            pending: None,
            outcome: None,
        }
    }

    /// Returns true when a create finished and the model list should reload
    pub fn poll(&mut self, state: &mut AppState) -> bool {
        if self.rx.is_empty() {
            return false;
        }

        let poll = ModelService::poll_all(state, &mut self.rx);
        if !self.rx.is_empty() {
            return false;
        }

        let name = self.pending.take().unwrap_or_default();
        self.outcome = Some(if poll.refresh {
            Ok(format!("Created '{name}'"))
        } else {
            Err(state.error.clone().unwrap_or_else(|| format!("Could not create {name}")))
        });
        poll.refresh
    }

    pub fn ui(&mut self, ui: &mut egui::Ui, state: &mut AppState, services: &Services) {
        ui.label(egui::RichText::new("Create Model").heading().color(egui::Color32::GRAY));
        ui.add_space(10.0);

        ui.horizontal(|ui| {
            ui.label("Name:");
            ui.add(egui::TextEdit::singleline(&mut self.name).hint_text("my-assistant"));
        });
        ui.add_space(5.0);

        ui.label(egui::RichText::new("Modelfile").strong());
        egui::ScrollArea::vertical().max_height(360.0).show(ui, |ui| {
            ui.add(
                egui::TextEdit::multiline(&mut self.modelfile)
                    .code_editor()
                    .desired_rows(16)
                    .desired_width(f32::INFINITY),
            );
        });
        ui.add_space(5.0);

        ui.horizontal(|ui| {
            let busy = self.pending.is_some();
            let ready = !self.name.trim().is_empty() && !self.modelfile.trim().is_empty();
            if ui.add_enabled(ready && !busy, egui::Button::new("Create")).clicked() {
                self.start(state, services);
            }
            if ui.add_enabled(!busy, egui::Button::new("Reset")).clicked() {
                self.modelfile = TEMPLATE.to_string();
                self.outcome = None;
            }
            if let Some(name) = &self.pending {
                ui.spinner();
                ui.label(format!("Creating '{name}'..."));
            }
        });

        match &self.outcome {
            Some(Ok(message)) => {
                ui.label(egui::RichText::new(message).color(egui::Color32::GREEN));
            }
            Some(Err(error)) => {
                ui.label(egui::RichText::new(error).color(egui::Color32::RED));
            }
            None => {}
        }
    }

    fn start(&mut self, state: &mut AppState, services: &Services) {
        self.outcome = None;
        match services.models.create(&self.name, &self.modelfile) {
            Ok(rx) => {
                self.rx.push(rx);
                self.pending = Some(self.name.trim().to_string());
            }
            Err(e) => state.apply(AppAction::SetError(Some(e.to_string()))),
        }
    }
}
