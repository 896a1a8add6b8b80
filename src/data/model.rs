use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Key columns
// ---------------------------------------------------------------------------

pub const DATE_COLUMN: &str = "date";
pub const DOMAIN_COLUMN: &str = "domain";
pub const URL_COLUMN: &str = "url";
pub const DEVICE_COLUMN: &str = "device";
pub const PAGE_TYPE_COLUMN: &str = "page_type";

/// Columns that are never treated as metrics.
pub const KEY_COLUMNS: [&str; 5] = [
    DATE_COLUMN,
    DOMAIN_COLUMN,
    URL_COLUMN,
    DEVICE_COLUMN,
    PAGE_TYPE_COLUMN,
];

pub fn is_key_column(name: &str) -> bool {
    KEY_COLUMNS.contains(&name)
}

// ---------------------------------------------------------------------------
// Metric catalog
// ---------------------------------------------------------------------------

/// How a metric's values are expressed, which drives headline formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricUnit {
    /// Unitless decimal score (CLS).
    Score,
    Milliseconds,
    Seconds,
}

impl MetricUnit {
    /// Suffix appended to a formatted value.
    pub fn suffix(self) -> &'static str {
        match self {
            MetricUnit::Score => "",
            MetricUnit::Milliseconds => " ms",
            MetricUnit::Seconds => " s",
        }
    }

    /// Human description used next to the breakpoints.
    pub fn description(self) -> &'static str {
        match self {
            MetricUnit::Score => "decimal number (score)",
            MetricUnit::Milliseconds => "milliseconds (ms)",
            MetricUnit::Seconds => "seconds (s)",
        }
    }

    /// Axis title for charts of this unit.
    pub fn axis_label(self) -> &'static str {
        match self {
            MetricUnit::Score => "Score",
            MetricUnit::Milliseconds => "Time (ms)",
            MetricUnit::Seconds => "Time (s)",
        }
    }

    /// Round and render a value: scores to 2 decimals, milliseconds to the
    /// nearest integer, seconds to 1 decimal.
    pub fn format_value(self, value: f64) -> String {
        match self {
            MetricUnit::Score => format!("{value:.2}"),
            MetricUnit::Milliseconds => format!("{}", value.round() as i64),
            MetricUnit::Seconds => format!("{value:.1}"),
        }
    }
}

/// A metric column together with its "good" / "poor" breakpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub name: String,
    pub unit: MetricUnit,
    /// Values at or below this are good.
    pub first_breakpoint: f64,
    /// Values above this are poor.
    pub second_breakpoint: f64,
}

impl MetricSpec {
    pub fn new(name: &str, unit: MetricUnit, first: f64, second: f64) -> Self {
        Self {
            name: name.to_string(),
            unit,
            first_breakpoint: first,
            second_breakpoint: second,
        }
    }

    /// The standard Web Vitals catalog.
    pub fn web_vitals() -> Vec<MetricSpec> {
        use MetricUnit::*;
        vec![
            MetricSpec::new("CLS", Score, 0.1, 0.25),
            MetricSpec::new("FCP", Milliseconds, 1800.0, 3000.0),
            MetricSpec::new("FID", Milliseconds, 100.0, 300.0),
            MetricSpec::new("INP", Milliseconds, 200.0, 500.0),
            MetricSpec::new("LCP", Milliseconds, 2500.0, 4000.0),
            MetricSpec::new("TTFB", Milliseconds, 800.0, 1800.0),
        ]
    }

    /// Breakpoint rendered with its unit, e.g. `2500 ms` or `0.1`.
    pub fn breakpoint_label(&self, value: f64) -> String {
        format!("{value}{}", self.unit.suffix())
    }
}

// ---------------------------------------------------------------------------
// Record – one measurement event
// ---------------------------------------------------------------------------

/// One measurement event (one row of the warehouse result).
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub date: NaiveDateTime,
    pub domain: String,
    pub url: String,
    pub device: Option<String>,
    pub page_type: Option<String>,
    /// Metric column → value. A metric missing from the map is null.
    pub metrics: BTreeMap<String, f64>,
}

impl Record {
    /// Calendar date of the event, ignoring time of day.
    pub fn day(&self) -> NaiveDate {
        self.date.date()
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    /// Look up a categorical key column by name.
    pub fn category(&self, column: &str) -> Option<&str> {
        match column {
            DOMAIN_COLUMN => Some(self.domain.as_str()),
            URL_COLUMN => Some(self.url.as_str()),
            DEVICE_COLUMN => self.device.as_deref(),
            PAGE_TYPE_COLUMN => self.page_type.as_deref(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Table – the complete loaded result set
// ---------------------------------------------------------------------------

/// An ordered collection of records sharing one schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub records: Vec<Record>,
    /// Ordered list of metric column names (excludes key columns).
    pub metric_columns: Vec<String>,
}

impl Table {
    pub fn new(records: Vec<Record>, metric_columns: Vec<String>) -> Self {
        Table {
            records,
            metric_columns,
        }
    }

    /// Same schema, different rows.
    pub fn with_records(&self, records: Vec<Record>) -> Self {
        Table {
            records,
            metric_columns: self.metric_columns.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_metric(&self, name: &str) -> bool {
        self.metric_columns.iter().any(|m| m == name)
    }

    /// Earliest and latest calendar dates in the table.
    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.records.iter().map(Record::day).min()?;
        let max = self.records.iter().map(Record::day).max()?;
        Some((min, max))
    }

    /// Sorted unique values of a categorical column, nulls excluded.
    pub fn unique_values(&self, column: &str) -> Vec<String> {
        self.records
            .iter()
            .filter_map(|r| r.category(column))
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Page types present for a domain among rows where `metric` fired.
    pub fn page_types_for(&self, domain: &str, metric: &str) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| r.domain == domain && r.metric(metric).is_some())
            .filter_map(|r| r.page_type.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows, metrics [{}]",
            self.records.len(),
            self.metric_columns.join(", ")
        )
    }
}
