use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, TimeUnit, TimestampMicrosecondType};
use arrow::temporal_conversions::timestamp_us_to_datetime;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{
    is_key_column, Record, Table, DATE_COLUMN, DEVICE_COLUMN, DOMAIN_COLUMN, PAGE_TYPE_COLUMN,
    URL_COLUMN,
};
use crate::error::{DashboardError, Result};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a warehouse result set from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – a warehouse export (recommended)
/// * `.json`    – `[{ "date": "...", "domain": "...", "LCP": 1200, ... }, ...]`
/// * `.csv`     – header row with the same column names
///
/// Required columns are `date`, `domain` and `url`; `device` and
/// `page_type` are optional. Every other numeric column is a metric.
pub fn load_file(path: &Path) -> Result<Table> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => Err(DashboardError::UnsupportedExtension(other.to_string())),
    }?;

    log::info!("Loaded {} from {}", table, path.display());
    Ok(table)
}

/// Parse the date formats seen in warehouse exports.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS[.f]`, `YYYY-MM-DDTHH:MM:SS[.f]`
/// and RFC 3339 (converted to UTC).
pub fn parse_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn parse_date_at(s: &str, row: usize) -> Result<NaiveDateTime> {
    parse_date(s).ok_or_else(|| DashboardError::InvalidDate {
        row,
        value: s.to_string(),
    })
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Non-null values seen in a non-key column, split by whether they are
/// numbers.
#[derive(Debug, Default, Clone, Copy)]
struct ColumnTally {
    numeric: usize,
    other: usize,
}

impl ColumnTally {
    /// A column is a metric when most of its values are numbers. A column
    /// with no values at all is a metric that never fired. Text columns are
    /// ignored.
    fn is_metric(self) -> bool {
        self.other == 0 || self.numeric > self.other
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "date": "2024-01-01", "domain": ".sk", "url": "https://…",
///     "device": "mobile", "page_type": "article", "LCP": 1830, "CLS": null },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<Table> {
    let text = std::fs::read_to_string(path)?;
    let root: JsonValue = serde_json::from_str(&text)?;

    let rows = root
        .as_array()
        .ok_or_else(|| DashboardError::Malformed("expected top-level JSON array".into()))?;
    let objects = rows
        .iter()
        .enumerate()
        .map(|(i, rec)| {
            rec.as_object()
                .ok_or_else(|| DashboardError::Malformed(format!("row {i} is not a JSON object")))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut tallies: BTreeMap<&str, ColumnTally> = BTreeMap::new();
    for obj in &objects {
        for (key, val) in obj.iter() {
            if is_key_column(key) {
                continue;
            }
            let tally = tallies.entry(key.as_str()).or_default();
            match val {
                JsonValue::Null => {}
                JsonValue::Number(_) => tally.numeric += 1,
                _ => tally.other += 1,
            }
        }
    }
    let metric_columns: BTreeSet<String> = tallies
        .into_iter()
        .filter(|(_, t)| t.is_metric())
        .map(|(k, _)| k.to_string())
        .collect();

    let mut out = Vec::with_capacity(objects.len());
    for (i, obj) in objects.iter().enumerate() {
        let date = match obj.get(DATE_COLUMN) {
            Some(JsonValue::String(s)) => parse_date_at(s, i)?,
            Some(other) => {
                return Err(DashboardError::InvalidDate {
                    row: i,
                    value: other.to_string(),
                })
            }
            None => return Err(DashboardError::MissingColumn(DATE_COLUMN.into())),
        };
        let domain = json_string(obj.get(DOMAIN_COLUMN))
            .ok_or_else(|| DashboardError::MissingColumn(DOMAIN_COLUMN.into()))?;
        let url = json_string(obj.get(URL_COLUMN))
            .ok_or_else(|| DashboardError::MissingColumn(URL_COLUMN.into()))?;

        let mut metrics = BTreeMap::new();
        for name in &metric_columns {
            match obj.get(name) {
                None | Some(JsonValue::Null) => {}
                Some(JsonValue::Number(n)) => {
                    if let Some(v) = n.as_f64() {
                        metrics.insert(name.clone(), v);
                    }
                }
                Some(other) => {
                    return Err(DashboardError::InvalidNumber {
                        row: i,
                        column: name.clone(),
                        value: other.to_string(),
                    })
                }
            }
        }

        out.push(Record {
            date,
            domain,
            url,
            device: json_string(obj.get(DEVICE_COLUMN)),
            page_type: json_string(obj.get(PAGE_TYPE_COLUMN)),
            metrics,
        });
    }

    Ok(Table::new(out, metric_columns.into_iter().collect()))
}

fn json_string(val: Option<&JsonValue>) -> Option<String> {
    match val? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Null => None,
        other => Some(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, a leading UTF-8 BOM is
/// tolerated. Empty metric cells are null.
fn load_csv(path: &Path) -> Result<Table> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let index_of = |name: &str| headers.iter().position(|h| h == name);
    let date_idx = index_of(DATE_COLUMN)
        .ok_or_else(|| DashboardError::MissingColumn(DATE_COLUMN.into()))?;
    let domain_idx = index_of(DOMAIN_COLUMN)
        .ok_or_else(|| DashboardError::MissingColumn(DOMAIN_COLUMN.into()))?;
    let url_idx = index_of(URL_COLUMN)
        .ok_or_else(|| DashboardError::MissingColumn(URL_COLUMN.into()))?;
    let device_idx = index_of(DEVICE_COLUMN);
    let page_type_idx = index_of(PAGE_TYPE_COLUMN);

    let rows = reader
        .records()
        .collect::<std::result::Result<Vec<csv::StringRecord>, _>>()?;

    // Unnamed columns are pandas index columns, not metrics.
    let metric_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !h.is_empty() && !is_key_column(h))
        .filter(|(i, _)| {
            let mut tally = ColumnTally::default();
            for raw in rows.iter().filter_map(|r| r.get(*i)).map(str::trim) {
                if raw.is_empty() {
                    continue;
                }
                if raw.parse::<f64>().is_ok() {
                    tally.numeric += 1;
                } else {
                    tally.other += 1;
                }
            }
            tally.is_metric()
        })
        .map(|(i, h)| (i, h.clone()))
        .collect();

    let mut out = Vec::with_capacity(rows.len());

    for (row_no, record) in rows.iter().enumerate() {
        let field = |idx: usize| record.get(idx).unwrap_or("");

        let mut metrics = BTreeMap::new();
        for (idx, name) in &metric_cols {
            let raw = field(*idx).trim();
            if raw.is_empty() {
                continue;
            }
            let v: f64 = raw.parse().map_err(|_| DashboardError::InvalidNumber {
                row: row_no,
                column: name.clone(),
                value: raw.to_string(),
            })?;
            metrics.insert(name.clone(), v);
        }

        out.push(Record {
            date: parse_date_at(field(date_idx), row_no)?,
            domain: field(domain_idx).to_string(),
            url: field(url_idx).to_string(),
            device: device_idx.and_then(|i| non_empty(field(i))),
            page_type: page_type_idx.and_then(|i| non_empty(field(i))),
            metrics,
        });
    }

    Ok(Table::new(
        out,
        metric_cols.into_iter().map(|(_, name)| name).collect(),
    ))
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet export of the warehouse query.
///
/// Expected schema:
/// - `date`: Utf8, Date32/Date64 or Timestamp of any unit (zoned values are
///   read as UTC)
/// - `domain`, `url`, `device`, `page_type`: Utf8 / LargeUtf8
/// - any numeric column is a metric; other columns are ignored
fn load_parquet(path: &Path) -> Result<Table> {
    let file = std::fs::File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

    let schema = builder.schema().clone();
    let metric_columns: Vec<String> = schema
        .fields()
        .iter()
        .filter(|f| !is_key_column(f.name()) && f.data_type().is_numeric())
        .map(|f| f.name().clone())
        .collect();

    let reader = builder.build()?;
    let mut out = Vec::new();

    for batch_result in reader {
        let batch = batch_result?;
        let batch_schema = batch.schema();
        let column = |name: &str| -> Result<ArrayRef> {
            let idx = batch_schema
                .index_of(name)
                .map_err(|_| DashboardError::MissingColumn(name.to_string()))?;
            Ok(batch.column(idx).clone())
        };
        let optional_strings = |name: &str| -> Result<Option<ArrayRef>> {
            match batch_schema.index_of(name) {
                Ok(idx) => Ok(Some(cast(batch.column(idx), &DataType::Utf8)?)),
                Err(_) => Ok(None),
            }
        };

        let dates = date_values(&column(DATE_COLUMN)?, out.len())?;
        let domains = cast(&column(DOMAIN_COLUMN)?, &DataType::Utf8)?;
        let domains = domains.as_string::<i32>();
        let urls = cast(&column(URL_COLUMN)?, &DataType::Utf8)?;
        let urls = urls.as_string::<i32>();
        let devices = optional_strings(DEVICE_COLUMN)?;
        let page_types = optional_strings(PAGE_TYPE_COLUMN)?;

        let metric_arrays: Vec<(&String, ArrayRef)> = metric_columns
            .iter()
            .map(|name| -> Result<(&String, ArrayRef)> {
                Ok((name, cast(&column(name)?, &DataType::Float64)?))
            })
            .collect::<Result<_>>()?;

        for row in 0..batch.num_rows() {
            let date = dates[row];
            let mut metrics = BTreeMap::new();
            for (name, array) in &metric_arrays {
                let values = array.as_primitive::<Float64Type>();
                if !values.is_null(row) {
                    metrics.insert((*name).clone(), values.value(row));
                }
            }

            out.push(Record {
                date,
                domain: string_at(domains, row).unwrap_or_default(),
                url: string_at(urls, row).unwrap_or_default(),
                device: devices.as_ref().and_then(|a| string_at(a.as_string::<i32>(), row)),
                page_type: page_types
                    .as_ref()
                    .and_then(|a| string_at(a.as_string::<i32>(), row)),
                metrics,
            });
        }
    }

    Ok(Table::new(out, metric_columns))
}

// -- Arrow helpers --

/// Timestamps of a `date` column. Text is parsed like CSV dates so a bad
/// value is reported as written; `first_row` offsets row numbers across
/// batches.
fn date_values(array: &ArrayRef, first_row: usize) -> Result<Vec<NaiveDateTime>> {
    let null_at = |row: usize| DashboardError::InvalidDate {
        row: first_row + row,
        value: "null".into(),
    };

    match array.data_type() {
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => {
            let strings = cast(array, &DataType::Utf8)?;
            let strings = strings.as_string::<i32>();
            (0..strings.len())
                .map(|row| {
                    if strings.is_null(row) {
                        return Err(null_at(row));
                    }
                    parse_date_at(strings.value(row), first_row + row)
                })
                .collect()
        }
        other => {
            // Zoned timestamps are stored as UTC instants; keep them in UTC.
            let target = match other {
                DataType::Timestamp(_, Some(_)) => {
                    DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
                }
                _ => DataType::Timestamp(TimeUnit::Microsecond, None),
            };
            let micros = cast(array, &target)?;
            let micros = micros.as_primitive::<TimestampMicrosecondType>();
            (0..micros.len())
                .map(|row| {
                    if micros.is_null(row) {
                        return Err(null_at(row));
                    }
                    timestamp_us_to_datetime(micros.value(row)).ok_or_else(|| {
                        DashboardError::InvalidDate {
                            row: first_row + row,
                            value: micros.value(row).to_string(),
                        }
                    })
                })
                .collect()
        }
    }
}

fn string_at(array: &arrow::array::StringArray, row: usize) -> Option<String> {
    (!array.is_null(row)).then(|| array.value(row).to_string())
}
