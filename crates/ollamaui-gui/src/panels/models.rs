use std::sync::mpsc::Receiver;

use eframe::egui;
use egui_extras::{Column, TableBuilder};
use ollamaui_services::{format_size, AppAction, AppState, ModelEvent, ModelRecord, PullProgress, Services};

enum RowAction {
    Details(String),
    AskDelete(String),
    ConfirmDelete(String),
    CancelDelete,
}

pub struct ModelsPanel {
    pull_name: String,
    filter: String,
    confirm_delete: Option<String>,
}

impl ModelsPanel {
    pub fn new() -> Self {
        Self {
            pull_name: String::new(),
            filter: String::new(),
            confirm_delete: None,
        }
    }

    pub fn ui(
        &mut self,
        ui: &mut egui::Ui,
        state: &mut AppState,
        services: &Services,
        model_rx: &mut Vec<Receiver<ModelEvent>>,
    ) {
        ui.label(egui::RichText::new("Models").heading().color(egui::Color32::GRAY));
        ui.label(format!(
            "{} installed, {} on disk",
            state.model_count(),
            format_size(state.total_size())
        ));
        ui.add_space(10.0);

        self.render_pull(ui, state, services, model_rx);
        render_active_pulls(ui, state);
        ui.add_space(10.0);

        ui.horizontal(|ui| {
            ui.label("Filter:");
            ui.text_edit_singleline(&mut self.filter);
            if ui.add_enabled(!state.loading, egui::Button::new("Refresh")).clicked() {
                model_rx.push(services.models.refresh(state));
            }
            if state.loading {
                ui.spinner();
            }
        });
        ui.add_space(5.0);

        let filter = self.filter.trim().to_lowercase();
        let visible: Vec<&ModelRecord> = state
            .models
            .iter()
            .filter(|m| filter.is_empty() || m.name.to_lowercase().contains(&filter))
            .collect();

        if visible.is_empty() {
            ui.label(if state.models.is_empty() {
                "No models installed. Pull one above."
            } else {
                "No models match the filter."
            });
            return;
        }

        let actions = self.render_table(ui, &visible);
        for action in actions {
            self.apply(action, state, services, model_rx);
        }
    }

    fn render_pull(
        &mut self,
        ui: &mut egui::Ui,
        state: &mut AppState,
        services: &Services,
        model_rx: &mut Vec<Receiver<ModelEvent>>,
    ) {
        ui.horizontal(|ui| {
            ui.label("Pull model:");
            let response = ui.add(egui::TextEdit::singleline(&mut self.pull_name).hint_text("llama3:latest"));
            let submitted = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

            let name = self.pull_name.trim();
            let can_pull = !name.is_empty() && !state.pulls.is_pulling(name);
            let clicked = ui.add_enabled(can_pull, egui::Button::new("Pull")).clicked();
            if !can_pull || !(clicked || submitted) {
                return;
            }

            match services.models.pull(state, &self.pull_name) {
                Ok(rx) => {
                    model_rx.push(rx);
                    self.pull_name.clear();
                }
                Err(e) => state.apply(AppAction::SetError(Some(e.to_string()))),
            }
        });
    }

    fn render_table(&self, ui: &mut egui::Ui, models: &[&ModelRecord]) -> Vec<RowAction> {
        let mut actions = Vec::new();

        TableBuilder::new(ui)
            .striped(true)
            .column(Column::remainder().at_least(180.0))
            .column(Column::auto().at_least(70.0))
            .column(Column::auto().at_least(70.0))
            .column(Column::auto().at_least(70.0))
            .column(Column::auto().at_least(70.0))
            .column(Column::auto().at_least(100.0))
            .column(Column::auto().at_least(150.0))
            .header(20.0, |mut header| {
                for title in ["Name", "Size", "Family", "Params", "Quant", "Modified", ""] {
                    header.col(|ui| {
                        ui.strong(title);
                    });
                }
            })
            .body(|mut body| {
                for model in models {
                    body.row(22.0, |mut row| {
                        row.col(|ui| {
                            ui.label(egui::RichText::new(&model.name).monospace());
                        });
                        row.col(|ui| {
                            ui.label(format_size(model.size));
                        });
                        row.col(|ui| {
                            ui.label(model.details.family.as_str());
                        });
                        row.col(|ui| {
                            ui.label(model.details.parameter_size.as_str());
                        });
                        row.col(|ui| {
                            ui.label(model.details.quantization_level.as_str());
                        });
                        row.col(|ui| {
                            ui.label(model.modified_at.as_str());
                        });
                        row.col(|ui| {
                            self.render_row_buttons(ui, &model.name, &mut actions);
                        });
                    });
                }
            });

        actions
    }

    fn render_row_buttons(&self, ui: &mut egui::Ui, name: &str, actions: &mut Vec<RowAction>) {
        if self.confirm_delete.as_deref() == Some(name) {
            if ui
                .button(egui::RichText::new("Confirm").color(egui::Color32::RED))
                .clicked()
            {
                actions.push(RowAction::ConfirmDelete(name.to_string()));
            }
            if ui.button("Cancel").clicked() {
                actions.push(RowAction::CancelDelete);
            }
            return;
        }

        if ui.button("Details").clicked() {
            actions.push(RowAction::Details(name.to_string()));
        }
        if ui.button("Delete").clicked() {
            actions.push(RowAction::AskDelete(name.to_string()));
        }
    }

    fn apply(
        &mut self,
        action: RowAction,
        state: &mut AppState,
        services: &Services,
        model_rx: &mut Vec<Receiver<ModelEvent>>,
    ) {
        let started = match action {
            RowAction::AskDelete(name) => {
                self.confirm_delete = Some(name);
                return;
            }
            RowAction::CancelDelete => {
                self.confirm_delete = None;
                return;
            }
            RowAction::ConfirmDelete(name) => {
                self.confirm_delete = None;
                services.models.remove(&name)
            }
            RowAction::Details(name) => services.models.details(&name),
        };

        match started {
            Ok(rx) => model_rx.push(rx),
            Err(e) => state.apply(AppAction::SetError(Some(e.to_string()))),
        }
    }
}

fn render_active_pulls(ui: &mut egui::Ui, state: &AppState) {
    let pulls: Vec<&PullProgress> = state.pulls.active().collect();
    if pulls.is_empty() {
        return;
    }

    ui.add_space(5.0);
    for pull in pulls {
        let bar = egui::ProgressBar::new(pull.progress.unwrap_or(0.0)).text(pull_label(pull));
        let bar = match (&pull.error, pull.completed) {
            (Some(_), _) => bar.fill(egui::Color32::from_rgb(180, 60, 60)),
            (None, true) => bar.fill(egui::Color32::from_rgb(50, 160, 50)),
            (None, false) => bar,
        };
        ui.add(bar);
    }
}

fn pull_label(pull: &PullProgress) -> String {
    match (&pull.error, pull.completed) {
        (Some(error), _) => format!("Pull failed for {}: {}", pull.model, error),
        (None, true) => format!("{} - Complete!", pull.display_line()),
        (None, false) => pull.display_line(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pull_labels_follow_outcome() {
        assert_eq!(
            pull_label(&PullProgress::update("llama3", 40, "downloading", false)),
            "Pulling llama3: downloading (40%)"
        );
        assert!(pull_label(&PullProgress::update("llama3", 100, "Success", true)).ends_with("- Complete!"));
        assert_eq!(
            pull_label(&PullProgress::failed("ghost", "not found")),
            "Pull failed for ghost: not found"
        );
    }
}
