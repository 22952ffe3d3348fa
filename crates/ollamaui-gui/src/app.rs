use std::sync::mpsc::Receiver;

use eframe::egui;
use ollamaui_services::{AppAction, AppState, ChatService, ModelEvent, ModelService, Services};
use tracing::info;

use crate::panels::{
    chat::ChatPanel, create::CreatePanel, models::ModelsPanel, settings::SettingsPanel,
    terminal::TerminalPanel,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Chat,
    Models,
    Create,
    Settings,
}

pub struct OllamaUiApp {
    current_tab: Tab,

    // State and services (owned directly)
    state: AppState,
    services: Services,
    model_rx: Vec<Receiver<ModelEvent>>,

    // Panels (views)
    chat: ChatPanel,
    models: ModelsPanel,
    create: CreatePanel,
    settings: SettingsPanel,
    terminal: TerminalPanel,
}

impl OllamaUiApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, services: Services) -> Self {
        let config = services.config().clone();
        let mut state = AppState::with_history_limit(config.terminal.history_limit);

        if !config.chat.default_model.trim().is_empty() {
            ChatService::select_model(&mut state, config.chat.default_model.trim());
        }

        // Start loading models
        let model_rx = vec![services.models.refresh(&mut state)];

        let mut settings = SettingsPanel::new(config);
        settings.check_status(&services);

        let mut terminal = TerminalPanel::new();
        terminal.open(&mut state, &services);

        Self {
            current_tab: Tab::Chat,
            state,
            services,
            model_rx,
            chat: ChatPanel::new(),
            models: ModelsPanel::new(),
            create: CreatePanel::new(),
            settings,
            terminal,
        }
    }

    fn render_tabs(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.selectable_value(&mut self.current_tab, Tab::Chat, "Chat");
            ui.selectable_value(&mut self.current_tab, Tab::Models, "Models");
            ui.selectable_value(&mut self.current_tab, Tab::Create, "Create");
            ui.selectable_value(&mut self.current_tab, Tab::Settings, "Settings");

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let label = if self.terminal.is_open() { "Hide Terminal" } else { "Show Terminal" };
                if ui.button(label).clicked() {
                    self.terminal.toggle(&mut self.state, &self.services);
                }
            });
        });
    }

    fn render_status_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if self.state.loading {
                ui.spinner();
                ui.label("Loading models...");
            } else {
                ui.label(format!("{} models", self.state.model_count()));
            }

            let Some(error) = self.state.error.clone() else { return };
            ui.separator();
            ui.label(egui::RichText::new(error).color(egui::Color32::from_rgb(220, 50, 50)));
            if ui.small_button("Dismiss").clicked() {
                self.state.apply(AppAction::SetError(None));
            }
        });
    }

    /// Drain background results into state once per frame
    fn poll(&mut self) {
        let poll = ModelService::poll_all(&mut self.state, &mut self.model_rx);
        for progress in &poll.pulls {
            self.terminal.show_pull(&self.state, progress);
        }

        let created = self.create.poll(&mut self.state);
        if poll.refresh || created {
            let rx = self.services.models.refresh(&mut self.state);
            self.model_rx.push(rx);
        }

        self.services.prune_pulls(&mut self.state);
        self.chat.poll(&mut self.state);
        self.settings.poll();
        self.terminal.pump(&self.state);
    }
}

impl eframe::App for OllamaUiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll();

        egui::TopBottomPanel::top("tabs").show(ctx, |ui| {
            self.render_tabs(ui);
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            self.render_status_bar(ui);
        });

        if self.terminal.is_open() {
            egui::TopBottomPanel::bottom("terminal")
                .resizable(true)
                .default_height(260.0)
                .show(ctx, |ui| {
                    self.terminal.ui(ui, &mut self.state);
                });
        }

        egui::CentralPanel::default().show(ctx, |ui| match self.current_tab {
            Tab::Chat => self.chat.ui(ui, &mut self.state, &self.services),
            Tab::Models => self.models.ui(ui, &mut self.state, &self.services, &mut self.model_rx),
            Tab::Create => self.create.ui(ui, &mut self.state, &self.services),
            Tab::Settings => self.settings.ui(ui, &self.services),
        });

        ctx.request_repaint_after(std::time::Duration::from_millis(100));
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.terminal.close(&mut self.state);
        info!("Ollama UI shutting down");
    }
}
