use eframe::egui::Ui;
use egui_extras::{Column, TableBuilder};

use rusty_forecast::data::model::{Cell, RawSeries};
use rusty_forecast::forecast::ForecastRow;

const ROW_HEIGHT: f32 = 18.0;

// ---------------------------------------------------------------------------
// Tail previews
// ---------------------------------------------------------------------------

fn cell_text(cell: &Cell) -> String {
    match cell {
        Cell::Float(v) => format!("{v:.2}"),
        Cell::Null => String::new(),
        other => other.to_string(),
    }
}

/// Last `n` rows of the raw table, every column.
pub fn raw_tail_table(ui: &mut Ui, raw: &RawSeries, n: usize) {
    let rows = raw.tail(n);
    ui.push_id("raw_tail", |ui: &mut Ui| {
        TableBuilder::new(ui)
            .striped(true)
            .columns(Column::auto().at_least(70.0), raw.columns.len())
            .header(ROW_HEIGHT + 2.0, |mut header| {
                for name in &raw.columns {
                    header.col(|ui: &mut Ui| {
                        ui.strong(name);
                    });
                }
            })
            .body(|mut body| {
                for row in rows {
                    body.row(ROW_HEIGHT, |mut table_row| {
                        for idx in 0..raw.columns.len() {
                            table_row.col(|ui: &mut Ui| {
                                ui.label(cell_text(row.get(idx)));
                            });
                        }
                    });
                }
            });
    });
}

/// Last rows of the forecast with their bounds.
pub fn forecast_tail_table(ui: &mut Ui, rows: &[ForecastRow]) {
    const HEADERS: [&str; 4] = ["ds", "yhat", "yhat_lower", "yhat_upper"];
    ui.push_id("forecast_tail", |ui: &mut Ui| {
        TableBuilder::new(ui)
            .striped(true)
            .columns(Column::auto().at_least(90.0), HEADERS.len())
            .header(ROW_HEIGHT + 2.0, |mut header| {
                for name in HEADERS {
                    header.col(|ui: &mut Ui| {
                        ui.strong(name);
                    });
                }
            })
            .body(|mut body| {
                for r in rows {
                    body.row(ROW_HEIGHT, |mut table_row| {
                        table_row.col(|ui: &mut Ui| {
                            ui.label(r.ds.to_string());
                        });
                        for v in [r.yhat, r.yhat_lower, r.yhat_upper] {
                            table_row.col(|ui: &mut Ui| {
                                ui.label(format!("{v:.2}"));
                            });
                        }
                    });
                }
            });
    });
}
