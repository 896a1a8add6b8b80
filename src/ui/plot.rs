use std::f64::consts::{FRAC_PI_2, TAU};
use std::ops::RangeInclusive;

use chrono::{Datelike, NaiveDate};
use eframe::egui::{Color32, RichText, ScrollArea, Stroke, Ui};
use egui_plot::{
    Bar, BarChart, GridMark, HLine, Legend, Line, LineStyle, Plot, PlotPoint, PlotPoints, Points,
    Polygon,
};

use super::table::data_table;
use crate::color::{score_color, ColorMap};
use crate::data::aggregate::Series;
use crate::data::breakdown::{CategoryScores, Score};
use crate::data::model::{MetricSpec, MetricUnit};
use crate::pages::load_and_render::LoadAndRenderPage;
use crate::pages::web_vitals::WebVitalsPage;
use crate::pages::{display_name, DashboardPage};
use crate::state::{AppState, Page};

/// Largest angle one donut segment spans, so every polygon stays convex.
const PIE_STEP: f64 = TAU / 120.0;
const PIE_INNER_RADIUS: f64 = 0.5;
const CHART_HEIGHT: f32 = 280.0;

// ---------------------------------------------------------------------------
// Central panel
// ---------------------------------------------------------------------------

/// Render the current page's charts and data table.
pub fn dashboard(ui: &mut Ui, state: &AppState) {
    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| match state.page {
            Page::WebVitals => match &state.web_vitals {
                Some(page) => web_vitals(ui, page),
                None => nothing_loaded(ui),
            },
            Page::LoadAndRender => match &state.load_and_render {
                Some(page) => load_and_render(ui, page),
                None => nothing_loaded(ui),
            },
        });
}

fn nothing_loaded(ui: &mut Ui) {
    ui.centered_and_justified(|ui: &mut Ui| {
        ui.heading("No data loaded  (File → Reload)");
    });
}

fn headline(ui: &mut Ui, text: &str) {
    ui.vertical_centered(|ui: &mut Ui| {
        ui.label(RichText::new(text).heading().strong());
    });
    ui.add_space(8.0);
}

fn page_error(ui: &mut Ui, error: &str) {
    ui.colored_label(Color32::RED, format!("Error: {error}"));
}

// ---------------------------------------------------------------------------
// Web Vitals
// ---------------------------------------------------------------------------

fn web_vitals(ui: &mut Ui, page: &WebVitalsPage) {
    if let Some(err) = &page.error {
        page_error(ui, err);
    }
    let (Some(view), Some(spec)) = (&page.view, page.metric_spec()) else {
        return;
    };

    headline(ui, &view.headline);

    let series = Series {
        metric: spec.name.clone(),
        points: view.series.clone(),
    };
    let colors = ColorMap::new([spec.name.as_str()]);
    date_chart(ui, "web_vitals_line", &[series], spec.unit, &colors, Some(spec));

    ui.add_space(12.0);
    ui.columns(2, |cols: &mut [Ui]| {
        cols[0].strong("Records by page type");
        pie_chart(&mut cols[0], &view.pie);
        cols[1].strong(format!("{} rating by page type", spec.name));
        score_bars(&mut cols[1], &view.breakdown);
    });

    ui.add_space(12.0);
    ui.strong("Data");
    data_table(ui, &view.filtered, &page.export_metrics());
}

// ---------------------------------------------------------------------------
// Load and Render Time
// ---------------------------------------------------------------------------

fn load_and_render(ui: &mut Ui, page: &LoadAndRenderPage) {
    if let Some(err) = &page.error {
        page_error(ui, err);
    }
    let Some(view) = &page.view else {
        return;
    };

    headline(ui, &view.headline);

    let unit = page
        .metrics
        .first()
        .map(|m| m.unit)
        .unwrap_or(MetricUnit::Seconds);
    let colors = ColorMap::new(view.series.iter().map(|s| s.metric.as_str()));
    date_chart(ui, "load_and_render_line", &view.series, unit, &colors, None);

    ui.add_space(12.0);
    ui.strong("Data");
    data_table(ui, &view.filtered, &page.export_metrics());
}

// ---------------------------------------------------------------------------
// Charts
// ---------------------------------------------------------------------------

fn day_to_x(day: NaiveDate) -> f64 {
    day.num_days_from_ce() as f64
}

fn x_to_day(x: f64) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(x.round() as i32)
}

/// Per-day line chart with dates on the x axis. With `spec`, the two rating
/// breakpoints are drawn as dashed guides.
fn date_chart(
    ui: &mut Ui,
    id: &str,
    series: &[Series],
    unit: MetricUnit,
    colors: &ColorMap,
    spec: Option<&MetricSpec>,
) {
    Plot::new(id)
        .height(CHART_HEIGHT)
        .legend(Legend::default())
        .x_axis_label("Date")
        .y_axis_label(unit.axis_label())
        .x_axis_formatter(|mark: GridMark, _range: &RangeInclusive<f64>| {
            if (mark.value - mark.value.round()).abs() > f64::EPSILON {
                return String::new();
            }
            x_to_day(mark.value)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default()
        })
        .label_formatter(move |name: &str, value: &PlotPoint| {
            let day = x_to_day(value.x)
                .map(|d| d.to_string())
                .unwrap_or_default();
            let y = format!("{}{}", unit.format_value(value.y), unit.suffix());
            if name.is_empty() {
                format!("{day}\n{y}")
            } else {
                format!("{name}\n{day}\n{y}")
            }
        })
        .include_y(0.0)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            for s in series {
                let color = colors.color_for(&s.metric);
                let name = display_name(&s.metric);
                let points: Vec<[f64; 2]> =
                    s.points.iter().map(|&(d, v)| [day_to_x(d), v]).collect();

                plot_ui.line(
                    Line::new(PlotPoints::from(points.clone()))
                        .name(&name)
                        .color(color)
                        .width(2.0),
                );
                plot_ui.points(Points::new(points).name(&name).color(color).radius(3.0));
            }

            if let Some(spec) = spec {
                for (value, score) in [
                    (spec.first_breakpoint, Score::Good),
                    (spec.second_breakpoint, Score::NeedsImprovement),
                ] {
                    plot_ui.hline(
                        HLine::new(value)
                            .color(score_color(score))
                            .style(LineStyle::dashed_loose()),
                    );
                }
            }
        });
}

/// Donut chart of `slices`, starting at twelve o'clock and running clockwise.
fn pie_chart(ui: &mut Ui, slices: &[(String, usize)]) {
    let total: usize = slices.iter().map(|(_, n)| n).sum();
    if total == 0 {
        ui.label("No records.");
        return;
    }
    let colors = ColorMap::new(slices.iter().map(|(label, _)| label.as_str()));

    Plot::new("page_type_pie")
        .height(CHART_HEIGHT)
        .data_aspect(1.0)
        .legend(Legend::default())
        .show_axes(false)
        .show_grid(false)
        .show_x(false)
        .show_y(false)
        .allow_drag(false)
        .allow_zoom(false)
        .allow_scroll(false)
        .allow_boxed_zoom(false)
        .show(ui, |plot_ui| {
            let mut start = FRAC_PI_2;
            for (label, count) in slices {
                let share = *count as f64 / total as f64;
                let sweep = share * TAU;
                let name = format!("{label} ({:.1} %)", share * 100.0);
                let color = colors.color_for(label);
                for piece in donut_segments(start, sweep) {
                    plot_ui.polygon(
                        Polygon::new(PlotPoints::from(piece))
                            .name(&name)
                            .fill_color(color)
                            .stroke(Stroke::NONE),
                    );
                }
                start -= sweep;
            }
        });
}

/// Split a clockwise donut slice into small convex quads.
fn donut_segments(start: f64, sweep: f64) -> Vec<Vec<[f64; 2]>> {
    let steps = (sweep / PIE_STEP).ceil().max(1.0) as usize;
    let step = sweep / steps as f64;
    (0..steps)
        .map(|i| {
            let a0 = start - step * i as f64;
            let a1 = a0 - step;
            vec![
                [PIE_INNER_RADIUS * a0.cos(), PIE_INNER_RADIUS * a0.sin()],
                [a0.cos(), a0.sin()],
                [a1.cos(), a1.sin()],
                [PIE_INNER_RADIUS * a1.cos(), PIE_INNER_RADIUS * a1.sin()],
            ]
        })
        .collect()
}

/// Stacked bars of rating shares, one bar per category, each summing to 100 %.
fn score_bars(ui: &mut Ui, breakdown: &[CategoryScores]) {
    if breakdown.is_empty() {
        ui.label("No records.");
        return;
    }
    let labels: Vec<String> = breakdown.iter().map(|c| c.label.clone()).collect();

    let chart = |score: Score| {
        let bars: Vec<Bar> = breakdown
            .iter()
            .enumerate()
            .map(|(i, c)| {
                Bar::new(i as f64, c.fraction(score))
                    .name(&c.label)
                    .width(0.6)
            })
            .collect();
        BarChart::new(bars)
            .name(score.label())
            .color(score_color(score))
    };
    let good = chart(Score::Good);
    let needs_improvement = chart(Score::NeedsImprovement).stack_on(&[&good]);
    let poor = chart(Score::Poor).stack_on(&[&good, &needs_improvement]);

    Plot::new("score_bars")
        .height(CHART_HEIGHT)
        .legend(Legend::default())
        .include_y(0.0)
        .include_y(1.0)
        .allow_drag(false)
        .allow_zoom(false)
        .allow_scroll(false)
        .x_axis_formatter(move |mark: GridMark, _range: &RangeInclusive<f64>| {
            let i = mark.value.round();
            if (mark.value - i).abs() > f64::EPSILON || i < 0.0 {
                return String::new();
            }
            labels.get(i as usize).cloned().unwrap_or_default()
        })
        .y_axis_formatter(|mark: GridMark, _range: &RangeInclusive<f64>| {
            format!("{:.0} %", mark.value * 100.0)
        })
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(good);
            plot_ui.bar_chart(needs_improvement);
            plot_ui.bar_chart(poor);
        });
}
