use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;

use super::{percentile_from_quantile, CommonControls, DashboardPage};
use crate::config::DashboardConfig;
use crate::data::aggregate::{aggregate, total_value};
use crate::data::breakdown::{bucket_top_n, score_breakdown, value_counts, CategoryScores};
use crate::data::filter::{filter, FilterCriteria};
use crate::data::model::{MetricSpec, Table, DEVICE_COLUMN, PAGE_TYPE_COLUMN};
use crate::error::{DashboardError, Result};

/// Metric selected when the data carries it.
const DEFAULT_METRIC: &str = "LCP";
/// Top-N slider default.
const DEFAULT_TOP_N: usize = 5;

// ---------------------------------------------------------------------------
// Controls
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct WebVitalsControls {
    pub common: CommonControls,
    pub devices: BTreeSet<String>,
    pub metric: String,
    pub page_types: BTreeSet<String>,
    /// Percentile in percent, `5..=100` in steps of 5.
    pub percentile: u32,
    pub top_n: usize,
}

impl WebVitalsControls {
    pub fn quantile(&self) -> f64 {
        self.percentile as f64 / 100.0
    }

    pub fn criteria(&self) -> FilterCriteria {
        FilterCriteria {
            metric: Some(self.metric.clone()),
            devices: self.devices.clone(),
            page_types: self.page_types.clone(),
            ..self.common.criteria()
        }
    }
}

// ---------------------------------------------------------------------------
// View
// ---------------------------------------------------------------------------

/// Everything the Web Vitals page draws.
#[derive(Debug, Clone, PartialEq)]
pub struct WebVitalsView {
    pub filtered: Table,
    /// Per-day quantile of the selected metric.
    pub series: Vec<(NaiveDate, f64)>,
    pub total: Option<f64>,
    pub headline: String,
    /// Records per page type, most frequent first.
    pub page_type_counts: Vec<(String, usize)>,
    /// Top N page types plus "other", for the pie chart.
    pub pie: Vec<(String, usize)>,
    /// Score shares per top page type, for the stacked bar chart.
    pub breakdown: Vec<CategoryScores>,
    /// Top N actually applied after clamping.
    pub top_n: usize,
}

impl WebVitalsView {
    pub fn compute(table: &Table, controls: &WebVitalsControls, spec: &MetricSpec) -> Result<Self> {
        let q = controls.quantile();
        let filtered = filter(table, &controls.criteria())?;
        let series = aggregate(&filtered, &spec.name, q)?;
        let total = total_value(&filtered, &spec.name, q)?;

        let page_type_counts = value_counts(&filtered, PAGE_TYPE_COLUMN);
        let top_n = if controls.page_types.len() == 1 {
            1
        } else {
            controls.top_n.clamp(1, page_type_counts.len().max(1))
        };
        let pie = bucket_top_n(&page_type_counts, top_n);
        let top_labels: Vec<String> = page_type_counts
            .iter()
            .take(top_n)
            .map(|(label, _)| label.clone())
            .collect();
        let breakdown = score_breakdown(&filtered, spec, &top_labels);

        let value = total
            .map(|v| format!("{}{}", spec.unit.format_value(v), spec.unit.suffix()))
            .unwrap_or_else(|| "n/a".to_string());
        let headline = format!(
            "{} ({value}) [{}th percentile]",
            spec.name, controls.percentile
        );

        Ok(Self {
            filtered,
            series,
            total,
            headline,
            page_type_counts,
            pie,
            breakdown,
            top_n,
        })
    }
}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

pub struct WebVitalsPage {
    query: String,
    table: Arc<Table>,
    /// Catalog entries whose column exists in the table.
    pub metrics: Vec<MetricSpec>,
    pub devices: Vec<String>,
    pub controls: WebVitalsControls,
    pub view: Option<WebVitalsView>,
    pub error: Option<String>,
}

impl WebVitalsPage {
    pub fn new(query: &str, table: Arc<Table>, config: &DashboardConfig) -> Self {
        let metrics: Vec<MetricSpec> = config
            .metrics
            .iter()
            .filter(|m| table.has_metric(&m.name))
            .cloned()
            .collect();
        let metric = metrics
            .iter()
            .find(|m| m.name == DEFAULT_METRIC)
            .or_else(|| metrics.first())
            .map(|m| m.name.clone())
            .unwrap_or_default();

        let controls = WebVitalsControls {
            common: CommonControls::new(&table, &config.web_vitals.default_domain),
            devices: BTreeSet::new(),
            metric,
            page_types: BTreeSet::new(),
            percentile: percentile_from_quantile(config.web_vitals.default_quantile),
            top_n: DEFAULT_TOP_N,
        };

        let mut page = Self {
            query: query.to_string(),
            devices: table.unique_values(DEVICE_COLUMN),
            table,
            metrics,
            controls,
            view: None,
            error: None,
        };
        page.refresh();
        page
    }

    pub fn metric_spec(&self) -> Option<&MetricSpec> {
        self.metrics.iter().find(|m| m.name == self.controls.metric)
    }

    /// Page types offered for the current domain and metric.
    pub fn page_type_options(&self) -> Vec<String> {
        self.table
            .page_types_for(&self.controls.common.domain, &self.controls.metric)
    }

    /// Select a different metric, dropping page types it does not cover.
    pub fn set_metric(&mut self, metric: &str) {
        self.controls.metric = metric.to_string();
        self.retain_page_types();
    }

    /// Select a different domain, dropping page types it does not cover.
    pub fn set_domain(&mut self, domain: &str) {
        self.controls.common.domain = domain.to_string();
        self.retain_page_types();
    }

    fn retain_page_types(&mut self) {
        let options = self.page_type_options();
        self.controls
            .page_types
            .retain(|p| options.iter().any(|o| o == p));
    }

    /// Recompute the view from the current controls.
    pub fn refresh(&mut self) {
        self.controls.common.clamp_dates();
        let result = match self.metric_spec() {
            Some(spec) => WebVitalsView::compute(&self.table, &self.controls, spec),
            None => Err(DashboardError::UnknownMetric(self.controls.metric.clone())),
        };
        match result {
            Ok(view) => {
                self.view = Some(view);
                self.error = None;
            }
            Err(e) => {
                log::warn!("Web Vitals view failed: {e}");
                self.view = None;
                self.error = Some(e.to_string());
            }
        }
    }
}

impl DashboardPage for WebVitalsPage {
    fn title(&self) -> &'static str {
        "Web Vitals"
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
        vec![self.controls.metric.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::breakdown::Score;
    use crate::data::model::test_support::{record, table};
    use crate::data::model::Record;

    fn row(date: &str, domain: &str, device: &str, page_type: &str, lcp: Option<f64>) -> Record {
        let metrics: Vec<(&str, f64)> = lcp.map(|v| ("LCP", v)).into_iter().collect();
        let mut r = record(date, domain, &format!("https://x{domain}/{page_type}"), &metrics);
        r.device = Some(device.to_string());
        r.page_type = Some(page_type.to_string());
        r
    }

    fn data() -> Arc<Table> {
        Arc::new(table(
            vec![
                row("2024-01-01", ".sk", "mobile", "article", Some(1000.0)),
                row("2024-01-01", ".sk", "desktop", "article", Some(3000.0)),
                row("2024-01-02", ".sk", "mobile", "home", Some(5000.0)),
                row("2024-01-02", ".sk", "mobile", "video", None),
                row("2024-01-02", ".cz", "mobile", "gallery", Some(2000.0)),
                row("2024-01-03", ".sk", "desktop", "section", Some(2000.0)),
            ],
            &["LCP", "CLS"],
        ))
    }

    #[test]
    fn new_page_uses_config_defaults() {
        let page = WebVitalsPage::new("wv", data(), &DashboardConfig::default());
        assert_eq!(page.controls.metric, "LCP");
        assert_eq!(page.controls.common.domain, ".sk");
        assert_eq!(page.controls.percentile, 75);
        assert_eq!(page.devices, vec!["desktop", "mobile"]);
        assert_eq!(
            page.metrics.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(),
            vec!["CLS", "LCP"]
        );
        assert!(page.error.is_none());
    }

    #[test]
    fn view_filters_aggregates_and_buckets() {
        let mut page = WebVitalsPage::new("wv", data(), &DashboardConfig::default());
        page.controls.top_n = 1;
        page.refresh();
        let view = page.view.as_ref().unwrap();

        // .sk with a non-null LCP: 4 rows over 3 days.
        assert_eq!(view.filtered.len(), 4);
        assert_eq!(view.series.len(), 3);
        assert_eq!(view.series[0].1, 2500.0);
        assert_eq!(view.total, Some(3500.0));
        assert_eq!(view.headline, "LCP (3500 ms) [75th percentile]");

        assert_eq!(view.pie[0], ("article".to_string(), 2));
        assert_eq!(view.pie[1], ("other".to_string(), 2));
        assert_eq!(view.breakdown[0].label, "article");
        assert_eq!(view.breakdown[0].count(Score::Good), 1);
        assert_eq!(view.breakdown[0].count(Score::NeedsImprovement), 1);
        assert_eq!(view.breakdown[1].count(Score::Poor), 1);
    }

    #[test]
    fn single_page_type_forces_top_one() {
        let mut page = WebVitalsPage::new("wv", data(), &DashboardConfig::default());
        page.controls.page_types.insert("article".into());
        page.refresh();
        let view = page.view.as_ref().unwrap();
        assert_eq!(view.top_n, 1);
        assert_eq!(view.pie, vec![("article".to_string(), 2)]);
    }

    #[test]
    fn device_filter_narrows_rows() {
        let mut page = WebVitalsPage::new("wv", data(), &DashboardConfig::default());
        page.controls.devices.insert("desktop".into());
        page.refresh();
        assert_eq!(page.view.as_ref().unwrap().filtered.len(), 2);
    }

    #[test]
    fn page_type_options_follow_domain_and_metric() {
        let mut page = WebVitalsPage::new("wv", data(), &DashboardConfig::default());
        assert_eq!(page.page_type_options(), vec!["article", "home", "section"]);

        page.controls.page_types.insert("home".into());
        page.set_domain(".cz");
        assert_eq!(page.page_type_options(), vec!["gallery"]);
        assert!(page.controls.page_types.is_empty());
    }

    #[test]
    fn metric_without_values_reports_no_total() {
        let mut page = WebVitalsPage::new("wv", data(), &DashboardConfig::default());
        page.set_metric("CLS");
        page.refresh();
        let view = page.view.as_ref().unwrap();
        assert!(view.filtered.is_empty());
        assert_eq!(view.total, None);
        assert_eq!(view.headline, "CLS (n/a) [75th percentile]");
    }

    #[test]
    fn export_contains_only_selected_metric() {
        let page = WebVitalsPage::new("wv", data(), &DashboardConfig::default());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        page.export(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let header = text.lines().next().unwrap();
        assert!(header.ends_with("page_type,LCP"));
        assert_eq!(text.lines().count(), 5);
    }
}
