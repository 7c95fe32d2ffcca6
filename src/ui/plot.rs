use std::ops::RangeInclusive;

use chrono::{Datelike, Duration, NaiveDate};
use eframe::egui::{Stroke, Ui};
use egui_plot::{GridMark, Legend, Line, Plot, PlotPoint, PlotPoints, PlotUi, Points, Polygon};

use rusty_forecast::data::model::Observation;
use rusty_forecast::forecast::ForecastResult;

use crate::color::SeriesColors;

const CHART_HEIGHT: f32 = 280.0;
const COMPONENT_HEIGHT: f32 = 180.0;

// ---------------------------------------------------------------------------
// Date axis helpers
// ---------------------------------------------------------------------------

fn x_of(ds: NaiveDate) -> f64 {
    f64::from(ds.num_days_from_ce())
}

fn date_of(x: f64) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(x.round() as i32)
}

fn date_axis(mark: GridMark, _range: &RangeInclusive<f64>) -> String {
    date_of(mark.value)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn hover_label(name: &str, value: &PlotPoint) -> String {
    let date = date_of(value.x).map(|d| d.to_string()).unwrap_or_default();
    if name.is_empty() {
        format!("{date}\n{:.2}", value.y)
    } else {
        format!("{name}\n{date}\n{:.2}", value.y)
    }
}

/// Show a plot with a date x-axis; `add` draws the items.
fn show_dated(ui: &mut Ui, id: &str, height: f32, y_label: &str, add: impl FnOnce(&mut PlotUi)) {
    Plot::new(id)
        .height(height)
        .legend(Legend::default())
        .x_axis_formatter(date_axis)
        .label_formatter(hover_label)
        .y_axis_label(y_label)
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(false)
        .allow_zoom(true)
        .show(ui, |plot_ui| add(plot_ui));
}

// ---------------------------------------------------------------------------
// Closing price
// ---------------------------------------------------------------------------

/// Line chart of the validated closing prices.
pub fn price_chart(ui: &mut Ui, history: &[Observation], colors: &SeriesColors) {
    let mut sorted = history.to_vec();
    sorted.sort_by_key(|o| o.ds);
    let points: PlotPoints = sorted.iter().map(|o| [x_of(o.ds), o.y]).collect();

    show_dated(ui, "price_chart", CHART_HEIGHT, "Close", |plot_ui| {
        plot_ui.line(Line::new(points).name("Close").color(colors.history).width(1.5));
    });
}

// ---------------------------------------------------------------------------
// Forecast
// ---------------------------------------------------------------------------

/// Observed points, predicted line and shaded uncertainty band.
pub fn forecast_chart(ui: &mut Ui, history: &[Observation], forecast: &ForecastResult, colors: &SeriesColors) {
    let observed: PlotPoints = history.iter().map(|o| [x_of(o.ds), o.y]).collect();
    let predicted: PlotPoints = forecast
        .rows
        .iter()
        .map(|r| [x_of(r.ds), r.yhat])
        .collect();

    show_dated(ui, "forecast_chart", CHART_HEIGHT, "Close", |plot_ui| {
        // one convex quad per step keeps the fill correct
        for pair in forecast.rows.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            let quad = vec![
                [x_of(a.ds), a.yhat_lower],
                [x_of(b.ds), b.yhat_lower],
                [x_of(b.ds), b.yhat_upper],
                [x_of(a.ds), a.yhat_upper],
            ];
            plot_ui.polygon(
                Polygon::new(PlotPoints::from(quad))
                    .name("Uncertainty")
                    .fill_color(colors.band)
                    .stroke(Stroke::NONE),
            );
        }
        plot_ui.points(Points::new(observed).name("Actual").color(colors.history).radius(1.5));
        plot_ui.line(Line::new(predicted).name("Forecast").color(colors.forecast).width(1.5));
    });
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

/// Trend over the whole axis, then one cycle of each seasonality.
pub fn component_charts(ui: &mut Ui, forecast: &ForecastResult, colors: &SeriesColors) {
    let rows = &forecast.rows;
    let trend: PlotPoints = rows
        .iter()
        .zip(&forecast.components.trend)
        .map(|(r, &v)| [x_of(r.ds), v])
        .collect();

    ui.label("trend");
    show_dated(ui, "component_trend", COMPONENT_HEIGHT, "", |plot_ui| {
        plot_ui.line(Line::new(trend).name("trend").color(colors.component(0)).width(1.5));
    });

    let Some(last) = rows.last().map(|r| r.ds) else {
        return;
    };

    for (i, component) in forecast.components.seasonal.iter().enumerate() {
        let cycle_start = last - Duration::days(component.period_days.ceil() as i64);
        let points: PlotPoints = rows
            .iter()
            .zip(&component.values)
            .filter(|(r, _)| r.ds > cycle_start)
            .map(|(r, &v)| [x_of(r.ds), v])
            .collect();

        ui.label(component.name.as_str());
        let id = format!("component_{}", component.name);
        show_dated(ui, &id, COMPONENT_HEIGHT, "", |plot_ui| {
            plot_ui.line(
                Line::new(points)
                    .name(&component.name)
                    .color(colors.component(i + 1))
                    .width(1.5),
            );
        });
    }
}
