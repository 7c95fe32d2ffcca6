mod app;
mod color;
mod state;
mod ui;

use app::RustyForecastApp;
use eframe::egui;
use rusty_forecast::config::AppConfig;

fn main() -> eframe::Result {
    env_logger::init();

    let config = AppConfig::load().unwrap_or_else(|e| {
        log::error!("could not read configuration, using defaults: {e:#}");
        AppConfig::default()
    });

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Stock Market Prediction",
        options,
        Box::new(|_cc| Ok(Box::new(RustyForecastApp::new(config)))),
    )
}
