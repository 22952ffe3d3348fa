use std::time::Instant;

use eframe::egui;
use ollamaui_services::{AppState, PullProgress, Services, TerminalSession, Tone};

pub struct TerminalPanel {
    session: Option<TerminalSession>,
}

impl TerminalPanel {
    pub fn new() -> Self {
        Self { session: None }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn open(&mut self, state: &mut AppState, services: &Services) {
        if self.session.is_none() {
            self.session = Some(services.open_terminal(state));
        }
    }

    pub fn close(&mut self, state: &mut AppState) {
        if let Some(session) = self.session.take() {
            session.shutdown(state);
        }
    }

    pub fn toggle(&mut self, state: &mut AppState, services: &Services) {
        if self.is_open() {
            self.close(state);
        } else {
            self.open(state, services);
        }
    }

    pub fn pump(&mut self, state: &AppState) {
        if let Some(session) = &mut self.session {
            session.pump(state, Instant::now());
        }
    }

    pub fn show_pull(&mut self, state: &AppState, progress: &PullProgress) {
        if let Some(session) = &mut self.session {
            session.show_pull(state, progress);
        }
    }

    pub fn ui(&mut self, ui: &mut egui::Ui, state: &mut AppState) {
        let Some(session) = &mut self.session else { return };
        let id = ui.make_persistent_id("terminal_screen");
        let focused = ui.memory(|m| m.has_focus(id));

        ui.horizontal(|ui| {
            ui.label(egui::RichText::new("Terminal").strong());
            if session.running() > 0 {
                ui.spinner();
            }
            if !focused {
                ui.label(egui::RichText::new("click to type").small().italics());
            }
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("Clear").clicked() {
                    session.clear();
                }
            });
        });

        let frame = egui::Frame::canvas(ui.style()).stroke(if focused {
            ui.visuals().selection.stroke
        } else {
            ui.visuals().widgets.noninteractive.bg_stroke
        });

        let output = frame
            .show(ui, |ui| {
                egui::ScrollArea::vertical()
                    .stick_to_bottom(true)
                    .auto_shrink([false, false])
                    .show(ui, |ui| {
                        let normal = ui.visuals().text_color();
                        for line in session.screen().lines() {
                            ui.label(
                                egui::RichText::new(line.text())
                                    .monospace()
                                    .color(tone_color(line.tone, normal)),
                            );
                        }
                    })
            })
            .inner;

        let response = ui.interact(output.inner_rect, id, egui::Sense::click());
        if response.clicked() {
            response.request_focus();
        }

        if focused {
            let input = ui.input(|i| translate_events(&i.events));
            if !input.is_empty() {
                session.handle_input(state, &input);
            }
        }
    }
}

fn tone_color(tone: Tone, normal: egui::Color32) -> egui::Color32 {
    match tone {
        Tone::Normal => normal,
        Tone::Red => egui::Color32::from_rgb(220, 50, 50),
        Tone::Green => egui::Color32::from_rgb(50, 205, 50),
        Tone::Yellow => egui::Color32::from_rgb(230, 200, 60),
    }
}

/// Turn a frame's keyboard events into the bytes a terminal would receive
fn translate_events(events: &[egui::Event]) -> String {
    let mut out = String::new();
    let mut interrupted = false;

    for event in events {
        match event {
            egui::Event::Text(text) => out.push_str(text),
            egui::Event::Paste(text) => out.push_str(&text.replace("\r\n", "\r").replace('\n', "\r")),
            // Ctrl+C arrives as Copy on most backends
            egui::Event::Copy if !interrupted => {
                interrupted = true;
                out.push('\u{3}');
            }
            egui::Event::Key {
                key,
                pressed: true,
                modifiers,
                ..
            } => match key {
                egui::Key::Enter => out.push('\r'),
                egui::Key::Backspace => out.push('\u{7f}'),
                egui::Key::C if modifiers.ctrl && !interrupted => {
                    interrupted = true;
                    out.push('\u{3}');
                }
                _ => {}
            },
            _ => {}
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(key: egui::Key, modifiers: egui::Modifiers) -> egui::Event {
        egui::Event::Key {
            key,
            physical_key: None,
            pressed: true,
            repeat: false,
            modifiers,
        }
    }

    #[test]
    fn typing_and_enter() {
        let events = vec![
            egui::Event::Text("ls".into()),
            key(egui::Key::Backspace, egui::Modifiers::NONE),
            egui::Event::Text("ist".into()),
            key(egui::Key::Enter, egui::Modifiers::NONE),
        ];
        assert_eq!(translate_events(&events), "l\u{7f}ist\r");
    }

    #[test]
    fn ctrl_c_sent_once() {
        let events = vec![egui::Event::Copy, key(egui::Key::C, egui::Modifiers::CTRL)];
        assert_eq!(translate_events(&events), "\u{3}");
    }

    #[test]
    fn pasted_newlines_submit() {
        let events = vec![egui::Event::Paste("ollama list\n".into())];
        assert_eq!(translate_events(&events), "ollama list\r");
    }

    #[test]
    fn released_keys_ignored() {
        let events = vec![egui::Event::Key {
            key: egui::Key::Enter,
            physical_key: None,
            pressed: false,
            repeat: false,
            modifiers: egui::Modifiers::NONE,
        }];
        assert!(translate_events(&events).is_empty());
    }
}
