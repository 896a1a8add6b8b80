//! Dashboard configuration.
//!
//! Read from the JSON file named by `WILIO_CONFIG`, else `wilio.json` in the
//! working directory, else built-in defaults. Every field is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::data::model::{MetricSpec, MetricUnit};
use crate::error::{DashboardError, Result};

pub const CONFIG_ENV: &str = "WILIO_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "wilio.json";

/// Settings for one dashboard page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageConfig {
    /// Query text handed to the data source (a file path for [`FileSource`]).
    ///
    /// [`FileSource`]: crate::data::source::FileSource
    pub query: String,
    /// Initial percentile slider position, in `[0, 1]`.
    pub default_quantile: f64,
    /// Domain preselected when present in the data.
    pub default_domain: String,
}

impl PageConfig {
    fn with(query: &str, default_quantile: f64) -> Self {
        Self {
            query: query.to_string(),
            default_quantile,
            default_domain: ".sk".to_string(),
        }
    }

    pub fn web_vitals() -> Self {
        PageConfig::with("web_vitals.parquet", 0.75)
    }

    pub fn load_and_render() -> Self {
        PageConfig::with("load_and_render_time.parquet", 0.95)
    }
}

/// A page block as written in the file; absent fields keep the page's own
/// defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageOverrides {
    query: Option<String>,
    default_quantile: Option<f64>,
    default_domain: Option<String>,
}

impl PageOverrides {
    fn apply(self, mut page: PageConfig) -> PageConfig {
        if let Some(query) = self.query {
            page.query = query;
        }
        if let Some(q) = self.default_quantile {
            page.default_quantile = q;
        }
        if let Some(domain) = self.default_domain {
            page.default_domain = domain;
        }
        page
    }
}

fn web_vitals_page<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<PageConfig, D::Error> {
    Ok(PageOverrides::deserialize(d)?.apply(PageConfig::web_vitals()))
}

fn load_and_render_page<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<PageConfig, D::Error> {
    Ok(PageOverrides::deserialize(d)?.apply(PageConfig::load_and_render()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Directory queries are resolved against.
    pub data_root: PathBuf,
    /// How long a fetched result set stays fresh.
    pub cache_ttl_minutes: u64,
    #[serde(deserialize_with = "web_vitals_page")]
    pub web_vitals: PageConfig,
    #[serde(deserialize_with = "load_and_render_page")]
    pub load_and_render: PageConfig,
    /// Web Vitals metric catalog with breakpoints.
    pub metrics: Vec<MetricSpec>,
    /// Metric columns charted on the Load and Render page.
    pub load_and_render_metrics: Vec<MetricSpec>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            cache_ttl_minutes: 60,
            web_vitals: PageConfig::web_vitals(),
            load_and_render: PageConfig::load_and_render(),
            metrics: MetricSpec::web_vitals(),
            load_and_render_metrics: vec![
                MetricSpec::new("page_load_time", MetricUnit::Seconds, 2.5, 4.0),
                MetricSpec::new("render_time", MetricUnit::Seconds, 1.0, 2.5),
            ],
        }
    }
}

impl DashboardConfig {
    /// Locate and read the configuration, falling back to defaults when no
    /// file is present.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::from_path(Path::new(&path));
        }
        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return Self::from_path(local);
        }
        log::info!("No {DEFAULT_CONFIG_FILE} found, using built-in defaults");
        Ok(Self::default())
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: DashboardConfig = serde_json::from_str(&text)?;
        config.validate()?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for page in [&self.web_vitals, &self.load_and_render] {
            if !(0.0..=1.0).contains(&page.default_quantile) {
                return Err(DashboardError::Config(format!(
                    "default_quantile {} for '{}' is outside [0, 1]",
                    page.default_quantile, page.query
                )));
            }
        }
        for m in self.metrics.iter().chain(&self.load_and_render_metrics) {
            if m.first_breakpoint > m.second_breakpoint {
                return Err(DashboardError::Config(format!(
                    "metric {}: first breakpoint exceeds second",
                    m.name
                )));
            }
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_minutes.saturating_mul(60))
    }

    /// Look up a metric in either catalog.
    pub fn metric(&self, name: &str) -> Option<&MetricSpec> {
        self.metrics
            .iter()
            .chain(&self.load_and_render_metrics)
            .find(|m| m.name == name)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_match_dashboard_constants() {
        let c = DashboardConfig::default();
        assert_eq!(c.web_vitals.default_quantile, 0.75);
        assert_eq!(c.load_and_render.default_quantile, 0.95);
        assert_eq!(c.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(c.metric("LCP").unwrap().second_breakpoint, 4000.0);
        assert_eq!(c.metric("render_time").unwrap().unit, MetricUnit::Seconds);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"{{ "cache_ttl_minutes": 10, "web_vitals": {{ "query": "wv.csv" }} }}"#
        )
        .unwrap();
        let c = DashboardConfig::from_path(f.path()).unwrap();
        assert_eq!(c.cache_ttl_minutes, 10);
        assert_eq!(c.web_vitals.query, "wv.csv");
        assert_eq!(c.web_vitals.default_domain, ".sk");
        assert_eq!(c.metrics.len(), 6);
    }

    #[test]
    fn out_of_range_quantile_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, r#"{{ "load_and_render": {{ "default_quantile": 95 }} }}"#).unwrap();
        assert!(matches!(
            DashboardConfig::from_path(f.path()),
            Err(DashboardError::Config(_))
        ));
    }

    #[test]
    fn metric_units_deserialize_snake_case() {
        let spec: MetricSpec = serde_json::from_str(
            r#"{ "name": "CLS", "unit": "score", "first_breakpoint": 0.1, "second_breakpoint": 0.25 }"#,
        )
        .unwrap();
        assert_eq!(spec.unit, MetricUnit::Score);
    }

    #[test]
    fn partial_page_block_keeps_that_pages_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, r#"{{ "load_and_render": {{ "default_domain": ".cz" }} }}"#).unwrap();
        let c = DashboardConfig::from_path(f.path()).unwrap();
        assert_eq!(c.load_and_render.query, "load_and_render_time.parquet");
        assert_eq!(c.load_and_render.default_quantile, 0.95);
        assert_eq!(c.load_and_render.default_domain, ".cz");
        assert_eq!(c.web_vitals, PageConfig::web_vitals());
    }

    #[test]
    fn huge_cache_ttl_saturates() {
        let c = DashboardConfig {
            cache_ttl_minutes: u64::MAX,
            ..Default::default()
        };
        assert_eq!(c.cache_ttl(), Duration::from_secs(u64::MAX));
    }
}
