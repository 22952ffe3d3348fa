use std::sync::mpsc::Receiver;

use eframe::egui;
use ollamaui_services::{AppAction, AppState, ChatEvent, ChatRole, ChatService, GenerateOptions, Services};

use super::components::render_model_selector;

pub struct ChatPanel {
    input: String,
    rx: Option<Receiver<ChatEvent>>,

    // Sampling options, only sent when enabled
    use_options: bool,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

impl ChatPanel {
    pub fn new() -> Self {
        Self {
            input: String::new(),
            rx: None,
            use_options: false,
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 512,
        }
    }

    pub fn poll(&mut self, state: &mut AppState) {
        ChatService::poll(state, &mut self.rx);
    }

    pub fn ui(&mut self, ui: &mut egui::Ui, state: &mut AppState, services: &Services) {
        ui.label(egui::RichText::new("Chat").heading().color(egui::Color32::GRAY));
        ui.add_space(5.0);

        ui.horizontal(|ui| {
            ui.label("Model:");
            let models = state.model_names();
            if let Some(model) =
                render_model_selector(ui, "chat_model", &models, &state.chat.model, state.loading, state.chat.waiting)
            {
                ChatService::select_model(state, model);
            }

            let can_clear = !state.chat.messages.is_empty() && !state.chat.waiting;
            if ui.add_enabled(can_clear, egui::Button::new("Clear")).clicked() {
                ChatService::clear(state);
            }
        });

        self.render_options(ui);
        ui.separator();

        egui::TopBottomPanel::bottom("chat_input")
            .show_separator_line(false)
            .show_inside(ui, |ui| self.render_input(ui, state, services));

        egui::ScrollArea::vertical()
            .stick_to_bottom(true)
            .auto_shrink([false, false])
            .show(ui, |ui| render_messages(ui, state));
    }

    fn render_options(&mut self, ui: &mut egui::Ui) {
        egui::CollapsingHeader::new("Options").show(ui, |ui| {
            ui.checkbox(&mut self.use_options, "Send sampling options");
            ui.add_enabled_ui(self.use_options, |ui| {
                ui.add(egui::Slider::new(&mut self.temperature, 0.0..=2.0).text("Temperature"));
                ui.add(egui::Slider::new(&mut self.top_p, 0.0..=1.0).text("Top P"));
                ui.add(egui::Slider::new(&mut self.max_tokens, 16..=8192).text("Max tokens"));
            });
        });
    }

    fn render_input(&mut self, ui: &mut egui::Ui, state: &mut AppState, services: &Services) {
        if let Some(error) = &state.chat.error {
            ui.label(egui::RichText::new(error).color(egui::Color32::from_rgb(220, 50, 50)));
        }

        ui.horizontal(|ui| {
            let response = ui.add(
                egui::TextEdit::multiline(&mut self.input)
                    .desired_rows(3)
                    .desired_width(ui.available_width() - 80.0)
                    .hint_text("Type a message... (Ctrl+Enter to send)"),
            );
            let shortcut = response.has_focus() && ui.input(|i| i.modifiers.command && i.key_pressed(egui::Key::Enter));

            let can_send = !state.chat.waiting && !state.chat.model.is_empty() && !self.input.trim().is_empty();
            let clicked = ui.add_enabled(can_send, egui::Button::new("Send")).clicked();
            if can_send && (clicked || shortcut) {
                self.send(state, services);
            }
        });
    }

    fn send(&mut self, state: &mut AppState, services: &Services) {
        let options = self.use_options.then(|| GenerateOptions {
            temperature: Some(self.temperature),
            top_p: Some(self.top_p),
            max_tokens: Some(self.max_tokens),
        });

        match services.chat.generate(state, &self.input, options) {
            Ok(rx) => {
                self.rx = Some(rx);
                self.input.clear();
            }
            Err(e) => state.apply(AppAction::SetError(Some(e.to_string()))),
        }
    }
}

fn render_messages(ui: &mut egui::Ui, state: &AppState) {
    if state.chat.messages.is_empty() && !state.chat.waiting {
        ui.label(egui::RichText::new("No messages yet. Pick a model and say hello.").italics());
        return;
    }

    for message in &state.chat.messages {
        let (who, color) = match message.role {
            ChatRole::User => ("You", egui::Color32::from_rgb(100, 150, 255)),
            ChatRole::Assistant => (state.chat.model.as_str(), egui::Color32::from_rgb(50, 205, 50)),
            ChatRole::System => ("System", egui::Color32::GRAY),
        };
        ui.label(egui::RichText::new(who).strong().color(color));
        ui.label(message.content.as_str());
        ui.add_space(8.0);
    }

    if state.chat.waiting {
        ui.horizontal(|ui| {
            ui.spinner();
            ui.label("Thinking...");
        });
    }
}
