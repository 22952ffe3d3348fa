use eframe::egui;

/// Render a model selector combo box with a spinner while models load.
///
/// Returns the newly selected model, if the user picked one.
pub fn render_model_selector(
    ui: &mut egui::Ui,
    id: &str,
    models: &[String],
    selected_model: &str,
    loading_models: bool,
    disabled: bool,
) -> Option<String> {
    let mut selected = None;

    ui.horizontal(|ui| {
        ui.add_enabled_ui(!disabled, |ui| {
            let selected_text = select_display_text(loading_models, models.is_empty(), selected_model);

            egui::ComboBox::from_id_salt(id)
                .selected_text(selected_text)
                .width(260.0)
                .show_ui(ui, |ui| {
                    for model in models {
                        let is_selected = selected_model == model;
                        if ui.selectable_label(is_selected, model).clicked() {
                            selected = Some(model.clone());
                        }
                    }
                });
        });

        if loading_models {
            ui.spinner();
        }
    });

    selected
}

fn select_display_text<'a>(loading: bool, empty: bool, selected: &'a str) -> &'a str {
    if !selected.is_empty() {
        return selected;
    }
    if loading {
        return "Loading models...";
    }
    if empty {
        return "No models found";
    }
    "Select model..."
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_wins_over_loading() {
        assert_eq!(select_display_text(true, true, "llama3:latest"), "llama3:latest");
        assert_eq!(select_display_text(true, true, ""), "Loading models...");
        assert_eq!(select_display_text(false, true, ""), "No models found");
        assert_eq!(select_display_text(false, false, ""), "Select model...");
    }
}
