use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::model::Table;
use crate::error::{DashboardError, Result};

// ---------------------------------------------------------------------------
// Quantile
// ---------------------------------------------------------------------------

/// Quantile of `values` using linear interpolation between the two closest
/// ranks (position `q * (n - 1)`). Returns `None` for an empty slice.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

fn check_quantile(q: f64) -> Result<()> {
    if (0.0..=1.0).contains(&q) {
        Ok(())
    } else {
        Err(DashboardError::InvalidQuantile(q))
    }
}

fn check_metric(table: &Table, metric: &str) -> Result<()> {
    if table.has_metric(metric) {
        Ok(())
    } else {
        Err(DashboardError::UnknownMetric(metric.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Date series
// ---------------------------------------------------------------------------

/// A named, date-ordered series of aggregated values.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub metric: String,
    pub points: Vec<(NaiveDate, f64)>,
}

/// Group rows by calendar date and reduce `metric` to quantile `q` per day.
///
/// Nulls are ignored; a day with no non-null values yields no point. The
/// result is strictly increasing in date.
pub fn aggregate(table: &Table, metric: &str, q: f64) -> Result<Vec<(NaiveDate, f64)>> {
    check_quantile(q)?;
    check_metric(table, metric)?;

    let mut by_day: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for r in &table.records {
        let values = by_day.entry(r.day()).or_default();
        if let Some(v) = r.metric(metric) {
            values.push(v);
        }
    }

    Ok(by_day
        .into_iter()
        .filter_map(|(day, values)| quantile(&values, q).map(|v| (day, v)))
        .collect())
}

/// [`aggregate`] applied to several metrics at once.
pub fn aggregate_many(table: &Table, metrics: &[&str], q: f64) -> Result<Vec<Series>> {
    metrics
        .iter()
        .map(|&metric| {
            Ok(Series {
                metric: metric.to_string(),
                points: aggregate(table, metric, q)?,
            })
        })
        .collect()
}

/// Headline value: quantile `q` of `metric` over the whole table.
/// `None` when the table has no non-null values for it.
pub fn total_value(table: &Table, metric: &str, q: f64) -> Result<Option<f64>> {
    check_quantile(q)?;
    check_metric(table, metric)?;

    let values: Vec<f64> = table
        .records
        .iter()
        .filter_map(|r| r.metric(metric))
        .collect();
    Ok(quantile(&values, q))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::test_support::{record, table};

    fn lcp_table() -> Table {
        table(
            vec![
                record("2024-01-02", ".sk", "/a", &[("LCP", 1000.0)]),
                record("2024-01-02", ".sk", "/b", &[("LCP", 2000.0)]),
                record("2024-01-02", ".sk", "/c", &[]),
                record("2024-01-02", ".sk", "/d", &[("LCP", 4000.0)]),
                record("2024-01-01", ".sk", "/e", &[("LCP", 500.0)]),
                record("2024-01-03", ".sk", "/f", &[]),
            ],
            &["LCP"],
        )
    }

    #[test]
    fn quantile_interpolates_linearly() {
        assert_eq!(quantile(&[1000.0, 2000.0, 4000.0], 0.75), Some(3000.0));
        assert_eq!(quantile(&[4000.0, 1000.0, 2000.0], 0.5), Some(2000.0));
        assert_eq!(quantile(&[1.0, 2.0, 3.0, 4.0], 0.5), Some(2.5));
        assert_eq!(quantile(&[7.0], 0.95), Some(7.0));
        assert_eq!(quantile(&[1.0, 9.0], 0.0), Some(1.0));
        assert_eq!(quantile(&[1.0, 9.0], 1.0), Some(9.0));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn aggregate_ignores_nulls_and_skips_empty_days() {
        let series = aggregate(&lcp_table(), "LCP", 0.75).unwrap();
        let days: Vec<String> = series.iter().map(|(d, _)| d.to_string()).collect();
        assert_eq!(days, vec!["2024-01-01", "2024-01-02"]);
        assert_eq!(series[0].1, 500.0);
        assert_eq!(series[1].1, 3000.0);
    }

    #[test]
    fn aggregate_dates_strictly_increase() {
        let series = aggregate(&lcp_table(), "LCP", 0.5).unwrap();
        assert!(series.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn time_of_day_does_not_split_groups() {
        let mut rows = lcp_table().records;
        rows[1].date = rows[1].date + chrono::Duration::hours(17);
        let series = aggregate(&table(rows, &["LCP"]), "LCP", 0.75).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[1].1, 3000.0);
    }

    #[test]
    fn total_value_covers_whole_table() {
        let t = table(
            vec![
                record("2024-01-01", ".sk", "/a", &[("LCP", 1000.0)]),
                record("2024-01-01", ".sk", "/b", &[("LCP", 2000.0)]),
                record("2024-01-01", ".sk", "/c", &[]),
                record("2024-01-01", ".sk", "/d", &[("LCP", 4000.0)]),
            ],
            &["LCP"],
        );
        assert_eq!(total_value(&t, "LCP", 0.75).unwrap(), Some(3000.0));
    }

    #[test]
    fn total_value_of_all_nulls_is_none() {
        let t = table(vec![record("2024-01-01", ".sk", "/", &[])], &["LCP"]);
        assert_eq!(total_value(&t, "LCP", 0.5).unwrap(), None);
    }

    #[test]
    fn rejects_bad_quantile_and_unknown_metric() {
        assert!(matches!(
            aggregate(&lcp_table(), "LCP", 1.5),
            Err(DashboardError::InvalidQuantile(_))
        ));
        assert!(matches!(
            total_value(&lcp_table(), "INP", 0.5),
            Err(DashboardError::UnknownMetric(_))
        ));
    }

    #[test]
    fn aggregate_many_names_each_series() {
        let t = table(
            vec![
                record("2024-01-01", ".sk", "/", &[("page_load_time", 2.0), ("render_time", 1.0)]),
                record("2024-01-01", ".sk", "/", &[("page_load_time", 4.0), ("render_time", 3.0)]),
            ],
            &["page_load_time", "render_time"],
        );
        let series = aggregate_many(&t, &["page_load_time", "render_time"], 0.5).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].metric, "page_load_time");
        assert_eq!(series[0].points[0].1, 3.0);
        assert_eq!(series[1].points[0].1, 2.0);
    }
}
