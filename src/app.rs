use eframe::egui::{self, Ui};

use rusty_forecast::config::AppConfig;

use crate::state::AppState;
use crate::ui::{panels, plot, tables};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct RustyForecastApp {
    pub state: AppState,
}

impl RustyForecastApp {
    pub fn new(config: AppConfig) -> Self {
        Self {
            state: AppState::new(config),
        }
    }
}

impl eframe::App for RustyForecastApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: ticker and dates ----
        egui::SidePanel::left("input_panel")
            .default_width(240.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: tables and charts ----
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Stock Market Prediction");
            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| results(ui, &self.state));
        });

        if self.state.poll() {
            ctx.request_repaint();
        }
    }
}

fn results(ui: &mut Ui, state: &AppState) {
    let Some(outcome) = &state.outcome else {
        ui.add_space(20.0);
        ui.label("Pick a ticker and a date range, then run a forecast.");
        return;
    };
    let tail_rows = state.config.tail_rows;

    if let Some(raw) = outcome.raw.as_deref().filter(|r| !r.is_empty()) {
        ui.separator();
        ui.strong("Raw Data");
        tables::raw_tail_table(ui, raw, tail_rows);
    }

    let Some(bundle) = outcome.display(tail_rows) else {
        return;
    };

    ui.separator();
    ui.strong("Closing Price over Time");
    plot::price_chart(ui, bundle.history, &state.colors);

    let (Some(forecast), Some(forecast_tail)) = (bundle.forecast, bundle.forecast_tail) else {
        return;
    };

    ui.separator();
    ui.strong("Forecast Data");
    tables::forecast_tail_table(ui, forecast_tail);

    ui.separator();
    ui.strong("Forecasted Data");
    plot::forecast_chart(ui, bundle.history, forecast, &state.colors);

    ui.separator();
    ui.strong("Forecast Components");
    plot::component_charts(ui, forecast, &state.colors);
}
