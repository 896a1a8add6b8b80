//! Per-page control state and the pure computation of each page's view.
//!
//! The UI only edits controls and draws views; everything derived from the
//! data happens here so it can be tested without a window.

pub mod load_and_render;
pub mod web_vitals;

use std::path::Path;

use chrono::NaiveDate;

use crate::data::export::save_csv;
use crate::data::filter::FilterCriteria;
use crate::data::model::{Table, DOMAIN_COLUMN};
use crate::error::Result;

/// Percentile slider bounds and step, in percent.
pub const PERCENTILE_MIN: u32 = 5;
pub const PERCENTILE_MAX: u32 = 100;
pub const PERCENTILE_STEP: u32 = 5;

/// Snap a quantile in `[0, 1]` to the nearest slider position.
pub fn percentile_from_quantile(q: f64) -> u32 {
    let pct = (q * 100.0 / PERCENTILE_STEP as f64).round() as u32 * PERCENTILE_STEP;
    pct.clamp(PERCENTILE_MIN, PERCENTILE_MAX)
}

/// `page_load_time` → `Page Load Time`. Short upper-case names stay as-is.
pub fn display_name(metric: &str) -> String {
    metric
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// What the top bar needs from whichever page is showing.
pub trait DashboardPage {
    fn title(&self) -> &'static str;

    /// Query text this page was loaded from.
    fn query(&self) -> &str;

    /// The full result set the page was built from.
    fn table(&self) -> &Table;

    /// Rows currently passing the page's filters.
    fn filtered(&self) -> Option<&Table>;

    /// Metric columns included in the CSV export.
    fn export_metrics(&self) -> Vec<String>;

    /// Write the filtered rows to `path`.
    fn export(&self, path: &Path) -> Result<()> {
        let Some(table) = self.filtered() else {
            return Ok(());
        };
        let metrics = self.export_metrics();
        let metrics: Vec<&str> = metrics.iter().map(String::as_str).collect();
        save_csv(table, &metrics, path)
    }
}

// ---------------------------------------------------------------------------
// Controls shared by both pages
// ---------------------------------------------------------------------------

/// Date range, domain and URL widgets present on every page.
#[derive(Debug, Clone, PartialEq)]
pub struct CommonControls {
    /// Inclusive bounds of the loaded data, the date pickers stay inside.
    pub min_date: NaiveDate,
    pub max_date: NaiveDate,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub domains: Vec<String>,
    pub domain: String,
    pub url: String,
    pub exact_url: bool,
}

impl CommonControls {
    /// Defaults: the full date range and `preferred_domain` when the data has
    /// it, otherwise the first domain.
    pub fn new(table: &Table, preferred_domain: &str) -> Self {
        let today = chrono::Local::now().date_naive();
        let (min_date, max_date) = table.date_bounds().unwrap_or((today, today));
        let domains = table.unique_values(DOMAIN_COLUMN);
        let domain = if domains.iter().any(|d| d == preferred_domain) {
            preferred_domain.to_string()
        } else {
            domains.first().cloned().unwrap_or_default()
        };
        Self {
            min_date,
            max_date,
            date_from: min_date,
            date_to: max_date,
            domains,
            domain,
            url: String::new(),
            exact_url: false,
        }
    }

    /// Pull both pickers back inside the data bounds.
    pub fn clamp_dates(&mut self) {
        self.date_from = self.date_from.clamp(self.min_date, self.max_date);
        self.date_to = self.date_to.clamp(self.min_date, self.max_date);
    }

    pub fn criteria(&self) -> FilterCriteria {
        FilterCriteria {
            domain: Some(self.domain.clone()),
            url: Some(self.url.trim().to_string()),
            exact_url: self.exact_url,
            date_from: Some(self.date_from),
            date_to: Some(self.date_to),
            ..Default::default()
        }
    }
}
