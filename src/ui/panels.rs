use std::collections::BTreeSet;

use eframe::egui::{self, Color32, RichText, ScrollArea, Slider, Ui};
use egui_extras::DatePickerButton;

use crate::color::score_color;
use crate::data::breakdown::Score;
use crate::pages::load_and_render::LoadAndRenderPage;
use crate::pages::web_vitals::WebVitalsPage;
use crate::pages::{CommonControls, DashboardPage, PERCENTILE_MAX, PERCENTILE_MIN, PERCENTILE_STEP};
use crate::state::{AppState, Page, Status};

// ---------------------------------------------------------------------------
// Left side panel – filter widgets
// ---------------------------------------------------------------------------

/// Render the left filter panel for the current page.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Filters");
    ui.separator();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| match state.page {
            Page::WebVitals => match state.web_vitals.as_mut() {
                Some(page) => web_vitals_filters(ui, page),
                None => {
                    ui.label("No data loaded.");
                }
            },
            Page::LoadAndRender => match state.load_and_render.as_mut() {
                Some(page) => load_and_render_filters(ui, page),
                None => {
                    ui.label("No data loaded.");
                }
            },
        });
}

fn web_vitals_filters(ui: &mut Ui, page: &mut WebVitalsPage) {
    let old_domain = page.controls.common.domain.clone();
    let mut changed = common_filters(ui, &mut page.controls.common);
    if page.controls.common.domain != old_domain {
        let domain = page.controls.common.domain.clone();
        page.set_domain(&domain);
    }

    changed |= multi_select(
        ui,
        "Device category",
        &page.devices,
        &mut page.controls.devices,
    );
    ui.separator();

    // ---- Metric + breakpoints ----
    ui.strong("Metric:");
    let mut new_metric = None;
    egui::ComboBox::from_id_salt("metric")
        .selected_text(page.controls.metric.as_str())
        .show_ui(ui, |ui: &mut Ui| {
            for spec in &page.metrics {
                if ui
                    .selectable_label(page.controls.metric == spec.name, spec.name.as_str())
                    .clicked()
                {
                    new_metric = Some(spec.name.clone());
                }
            }
        });
    if let Some(metric) = new_metric {
        page.set_metric(&metric);
        changed = true;
    }

    if let Some(spec) = page.metric_spec() {
        ui.label(format!("{} is measured as {}.", spec.name, spec.unit.description()));
        ui.label(
            RichText::new(format!("good ≤ {}", spec.breakpoint_label(spec.first_breakpoint)))
                .color(score_color(Score::Good)),
        );
        ui.label(
            RichText::new(format!(
                "needs improvement ≤ {}",
                spec.breakpoint_label(spec.second_breakpoint)
            ))
            .color(score_color(Score::NeedsImprovement)),
        );
        ui.label(
            RichText::new(format!("poor > {}", spec.breakpoint_label(spec.second_breakpoint)))
                .color(score_color(Score::Poor)),
        );
    }
    ui.separator();

    let page_types = page.page_type_options();
    changed |= multi_select(ui, "Page type", &page_types, &mut page.controls.page_types);
    ui.separator();

    changed |= percentile_slider(ui, &mut page.controls.percentile);

    // ---- Top N (meaningless with a single page type selected) ----
    let n_categories = page
        .view
        .as_ref()
        .map(|v| v.page_type_counts.len())
        .unwrap_or(0);
    if page.controls.page_types.len() != 1 && n_categories > 1 {
        page.controls.top_n = page.controls.top_n.clamp(1, n_categories);
        changed |= ui
            .add(Slider::new(&mut page.controls.top_n, 1..=n_categories).text("Top N"))
            .changed();
    }

    if changed {
        page.refresh();
    }
}

fn load_and_render_filters(ui: &mut Ui, page: &mut LoadAndRenderPage) {
    let mut changed = common_filters(ui, &mut page.controls.common);
    ui.separator();
    changed |= percentile_slider(ui, &mut page.controls.percentile);
    if changed {
        page.refresh();
    }
}

/// Date range, domain and URL widgets. Returns whether anything changed.
fn common_filters(ui: &mut Ui, c: &mut CommonControls) -> bool {
    let mut changed = false;

    ui.strong("Date from:");
    changed |= ui
        .add(DatePickerButton::new(&mut c.date_from).id_salt("date_from"))
        .changed();
    ui.strong("Date to:");
    changed |= ui
        .add(DatePickerButton::new(&mut c.date_to).id_salt("date_to"))
        .changed();

    ui.strong("Domain:");
    egui::ComboBox::from_id_salt("domain")
        .selected_text(c.domain.as_str())
        .show_ui(ui, |ui: &mut Ui| {
            for d in &c.domains {
                changed |= ui
                    .selectable_value(&mut c.domain, d.clone(), d.as_str())
                    .changed();
            }
        });

    ui.strong("URL:");
    changed |= ui
        .text_edit_singleline(&mut c.url)
        .on_hover_text("Type the whole or part of the URL.")
        .changed();
    changed |= ui.checkbox(&mut c.exact_url, "Exact URL").changed();

    changed
}

fn percentile_slider(ui: &mut Ui, percentile: &mut u32) -> bool {
    ui.add(
        Slider::new(percentile, PERCENTILE_MIN..=PERCENTILE_MAX)
            .step_by(PERCENTILE_STEP as f64)
            .text("Percentile"),
    )
    .changed()
}

/// Collapsible checkbox list. An empty selection means "no constraint".
fn multi_select(
    ui: &mut Ui,
    title: &str,
    options: &[String],
    selected: &mut BTreeSet<String>,
) -> bool {
    let mut changed = false;
    let header_text = if selected.is_empty() {
        format!("{title}  (all)")
    } else {
        format!("{title}  ({}/{})", selected.len(), options.len())
    };

    egui::CollapsingHeader::new(RichText::new(header_text).strong())
        .id_salt(title)
        .default_open(false)
        .show(ui, |ui: &mut Ui| {
            if ui.small_button("Clear").clicked() && !selected.is_empty() {
                selected.clear();
                changed = true;
            }
            for val in options {
                let mut checked = selected.contains(val);
                if ui.checkbox(&mut checked, val.as_str()).changed() {
                    if checked {
                        selected.insert(val.clone());
                    } else {
                        selected.remove(val);
                    }
                    changed = true;
                }
            }
        });

    changed
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Download data…").clicked() {
                save_file_dialog(state);
                ui.close_menu();
            }
            if ui.button("Reload").clicked() {
                state.reload();
                ui.close_menu();
            }
        });

        ui.separator();

        for page in Page::ALL {
            if ui
                .selectable_label(state.page == page, page.title())
                .clicked()
                && state.page != page
            {
                state.select_page(page);
            }
        }

        ui.separator();

        if let Some(page) = state.current() {
            ui.label(format!(
                "{} rows loaded from {}, {} visible",
                page.table().len(),
                page.query(),
                page.filtered().map(|t| t.len()).unwrap_or(0)
            ));
        }

        if let Some(status) = &state.status_message {
            ui.separator();
            let color = if status.is_error() {
                Color32::RED
            } else {
                Color32::from_rgb(0x2e, 0x9e, 0x4f)
            };
            ui.label(RichText::new(status.text()).color(color));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn save_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Download data")
        .set_file_name("data.csv")
        .add_filter("CSV", &["csv"])
        .save_file();

    if let Some(path) = file {
        if let Err(e) = state.export_current(&path) {
            log::error!("Failed to export: {e:#}");
            state.status_message = Some(Status::Error(format!("Error: {e:#}")));
        }
    }
}
