use eframe::egui::Ui;
use egui_extras::{Column, TableBuilder};

use crate::data::model::{Table, KEY_COLUMNS};

/// Scrollable grid of the filtered rows: key columns, then `metrics`.
pub fn data_table(ui: &mut Ui, table: &Table, metrics: &[String]) {
    let n_cols = KEY_COLUMNS.len() + metrics.len();

    TableBuilder::new(ui)
        .id_salt("data_table")
        .striped(true)
        .resizable(true)
        .max_scroll_height(400.0)
        .columns(Column::auto().at_least(60.0), n_cols)
        .header(20.0, |mut header| {
            for name in KEY_COLUMNS.iter().copied().chain(metrics.iter().map(String::as_str)) {
                header.col(|ui: &mut Ui| {
                    ui.strong(name);
                });
            }
        })
        .body(|body| {
            body.rows(18.0, table.len(), |mut row| {
                let r = &table.records[row.index()];
                row.col(|ui: &mut Ui| {
                    ui.label(r.date.format("%Y-%m-%d %H:%M:%S").to_string());
                });
                for column in &KEY_COLUMNS[1..] {
                    row.col(|ui: &mut Ui| {
                        ui.label(r.category(column).unwrap_or(""));
                    });
                }
                for metric in metrics {
                    row.col(|ui: &mut Ui| {
                        if let Some(v) = r.metric(metric) {
                            ui.label(format!("{v}"));
                        }
                    });
                }
            });
        });
}
