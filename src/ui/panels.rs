use eframe::egui::{self, RichText, Ui};
use egui_extras::DatePickerButton;

use rusty_forecast::config::SourceKind;
use rusty_forecast::data::loader::SUPPORTED_EXTENSIONS;

use crate::color::status_color;
use crate::state::{AppState, PendingRun};

// ---------------------------------------------------------------------------
// Left side panel – user input
// ---------------------------------------------------------------------------

/// Render the left input panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("User Input");
    ui.separator();

    ui.label("Enter Stock Ticker (e.g., AAPL for Apple)");
    let ticker = ui.text_edit_singleline(&mut state.ticker);
    let submitted = ticker.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
    ui.add_space(6.0);

    egui::Grid::new("date_range")
        .num_columns(2)
        .spacing([8.0, 6.0])
        .show(ui, |ui: &mut Ui| {
            ui.label("Start Date");
            ui.add(DatePickerButton::new(&mut state.start).id_salt("start_date"));
            ui.end_row();

            ui.label("End Date");
            ui.add(DatePickerButton::new(&mut state.end).id_salt("end_date"));
            ui.end_row();
        });
    ui.add_space(6.0);

    ui.strong("Data source");
    ui.radio_value(&mut state.source, SourceKind::Yahoo, "Yahoo Finance");
    ui.radio_value(
        &mut state.source,
        SourceKind::Directory,
        format!("Local files ({})", state.config.data_dir.display()),
    );
    ui.separator();

    let run = ui.add_enabled(!state.is_loading(), egui::Button::new("Run forecast"));
    if run.clicked() || submitted {
        state.request(PendingRun::Query);
    }

    ui.add_space(4.0);
    let cached = state.cache.len();
    if ui
        .add_enabled(cached > 0, egui::Button::new(format!("Clear cache ({cached})")))
        .clicked()
    {
        state.clear_cache();
    }
    if state.cache.is_disabled() {
        ui.weak("Caching disabled");
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open price file…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if state.is_loading() {
            ui.label("Loading data...");
        } else if let Some(outcome) = &state.outcome {
            ui.label(format!("{}: {}", outcome.label, outcome.status));
            if let Some(msg) = &outcome.message {
                ui.label(RichText::new(msg).color(status_color(outcome.status)));
            }
        }

        if let Some(msg) = &state.status_message {
            ui.label(RichText::new(msg).color(egui::Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open price history")
        .add_filter("Supported files", &SUPPORTED_EXTENSIONS)
        .add_filter("CSV", &["csv"])
        .add_filter("JSON", &["json"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file();

    if let Some(path) = file {
        state.request(PendingRun::File(path));
    }
}
