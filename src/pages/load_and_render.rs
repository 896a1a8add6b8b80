use std::sync::Arc;

use super::{display_name, percentile_from_quantile, CommonControls, DashboardPage};
use crate::config::DashboardConfig;
use crate::data::aggregate::{aggregate_many, total_value, Series};
use crate::data::filter::filter;
use crate::data::model::{MetricSpec, Table};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct LoadAndRenderControls {
    pub common: CommonControls,
    /// Percentile in percent, `5..=100` in steps of 5.
    pub percentile: u32,
}

impl LoadAndRenderControls {
    pub fn quantile(&self) -> f64 {
        self.percentile as f64 / 100.0
    }
}

/// Everything the Load and Render Time page draws.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadAndRenderView {
    pub filtered: Table,
    /// One per-day series per charted metric.
    pub series: Vec<Series>,
    pub totals: Vec<(String, Option<f64>)>,
    pub headline: String,
}

impl LoadAndRenderView {
    pub fn compute(
        table: &Table,
        controls: &LoadAndRenderControls,
        metrics: &[MetricSpec],
    ) -> Result<Self> {
        let q = controls.quantile();
        let filtered = filter(table, &controls.common.criteria())?;

        let names: Vec<&str> = metrics.iter().map(|m| m.name.as_str()).collect();
        let series = aggregate_many(&filtered, &names, q)?;

        let mut totals = Vec::with_capacity(metrics.len());
        let mut parts = Vec::with_capacity(metrics.len());
        for spec in metrics {
            let total = total_value(&filtered, &spec.name, q)?;
            let value = total
                .map(|v| format!("{}{}", spec.unit.format_value(v), spec.unit.suffix()))
                .unwrap_or_else(|| "n/a".to_string());
            parts.push(format!("{} ({value})", display_name(&spec.name)));
            totals.push((spec.name.clone(), total));
        }
        let headline = format!(
            "{} [{}th percentile]",
            parts.join(" and "),
            controls.percentile
        );

        Ok(Self {
            filtered,
            series,
            totals,
            headline,
        })
    }
}

pub struct LoadAndRenderPage {
    query: String,
    table: Arc<Table>,
    /// Configured metrics the table actually carries.
    pub metrics: Vec<MetricSpec>,
    pub controls: LoadAndRenderControls,
    pub view: Option<LoadAndRenderView>,
    pub error: Option<String>,
}

impl LoadAndRenderPage {
    pub fn new(query: &str, table: Arc<Table>, config: &DashboardConfig) -> Self {
        let metrics: Vec<MetricSpec> = config
            .load_and_render_metrics
            .iter()
            .filter(|m| table.has_metric(&m.name))
            .cloned()
            .collect();
        if metrics.is_empty() {
            log::warn!("'{query}' carries none of the configured load/render metrics");
        }
        let controls = LoadAndRenderControls {
            common: CommonControls::new(&table, &config.load_and_render.default_domain),
            percentile: percentile_from_quantile(config.load_and_render.default_quantile),
        };

        let mut page = Self {
            query: query.to_string(),
            table,
            metrics,
            controls,
            view: None,
            error: None,
        };
        page.refresh();
        page
    }

    /// Recompute the view from the current controls.
    pub fn refresh(&mut self) {
        self.controls.common.clamp_dates();
        match LoadAndRenderView::compute(&self.table, &self.controls, &self.metrics) {
            Ok(view) => {
                self.view = Some(view);
                self.error = None;
            }
            Err(e) => {
                log::warn!("Load and Render view failed: {e}");
                self.view = None;
                self.error = Some(e.to_string());
            }
        }
    }
}

impl DashboardPage for LoadAndRenderPage {
    fn title(&self) -> &'static str {
        "Load and Render Time"
    }

    fn query(&self) -> &str {
        &self.query
    }

    fn table(&self) -> &Table {
        &self.table
    }

    fn filtered(&self) -> Option<&Table> {
        self.view.as_ref().map(|v| &v.filtered)
    }

    fn export_metrics(&self) -> Vec<String> {
        self.table.metric_columns.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::test_support::{record, table};

    fn data() -> Arc<Table> {
        Arc::new(table(
            vec![
                record("2024-01-01", ".sk", "https://a.sk/", &[("page_load_time", 2.0), ("render_time", 1.0)]),
                record("2024-01-01", ".sk", "https://a.sk/x", &[("page_load_time", 4.0), ("render_time", 2.0)]),
                record("2024-01-02", ".sk", "https://a.sk/", &[("page_load_time", 3.0)]),
                record("2024-01-02", ".cz", "https://a.cz/", &[("page_load_time", 9.0), ("render_time", 9.0)]),
            ],
            &["page_load_time", "render_time"],
        ))
    }

    #[test]
    fn view_has_one_series_per_metric() {
        let page = LoadAndRenderPage::new("lr", data(), &DashboardConfig::default());
        assert_eq!(page.controls.percentile, 95);
        let view = page.view.as_ref().unwrap();
        assert_eq!(view.filtered.len(), 3);
        assert_eq!(view.series.len(), 2);
        assert_eq!(view.series[0].points.len(), 2);
        // render_time has no value on 2024-01-02.
        assert_eq!(view.series[1].points.len(), 1);
    }

    #[test]
    fn headline_reports_seconds_with_one_decimal() {
        let mut page = LoadAndRenderPage::new("lr", data(), &DashboardConfig::default());
        page.controls.percentile = 50;
        page.refresh();
        let view = page.view.as_ref().unwrap();
        assert_eq!(
            view.headline,
            "Page Load Time (3.0 s) and Render Time (1.5 s) [50th percentile]"
        );
        assert_eq!(view.totals[0], ("page_load_time".to_string(), Some(3.0)));
    }

    #[test]
    fn exact_url_narrows_to_one_page() {
        let mut page = LoadAndRenderPage::new("lr", data(), &DashboardConfig::default());
        page.controls.common.url = "https://a.sk/".into();
        page.controls.common.exact_url = true;
        page.refresh();
        assert_eq!(page.view.as_ref().unwrap().filtered.len(), 2);
    }

    #[test]
    fn export_includes_every_metric() {
        let page = LoadAndRenderPage::new("lr", data(), &DashboardConfig::default());
        assert_eq!(page.export_metrics(), vec!["page_load_time", "render_time"]);
    }
}
