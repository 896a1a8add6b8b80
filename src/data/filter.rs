use std::collections::BTreeSet;

use chrono::NaiveDate;

use super::model::{Record, Table};
use crate::error::{DashboardError, Result};

// ---------------------------------------------------------------------------
// Filter criteria: one optional constraint per widget
// ---------------------------------------------------------------------------

/// Parameter bundle for [`filter`].
/// A field that is `None` (or an empty string / empty set) means "no constraint".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    pub domain: Option<String>,
    pub url: Option<String>,
    /// Match `url` exactly instead of as a case-insensitive substring.
    pub exact_url: bool,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    /// Keep only rows where this metric is non-null.
    pub metric: Option<String>,
    pub devices: BTreeSet<String>,
    pub page_types: BTreeSet<String>,
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        self.domain().is_none()
            && self.url().is_none()
            && self.date_from.is_none()
            && self.date_to.is_none()
            && self.metric().is_none()
            && self.devices.is_empty()
            && self.page_types.is_empty()
    }

    fn domain(&self) -> Option<&str> {
        non_empty(&self.domain)
    }

    fn url(&self) -> Option<&str> {
        non_empty(&self.url)
    }

    fn metric(&self) -> Option<&str> {
        non_empty(&self.metric)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

/// A single row predicate built from one field of the criteria.
type Predicate<'a> = Box<dyn Fn(&Record) -> bool + 'a>;

/// Build the active predicates in application order.
fn predicates(criteria: &FilterCriteria) -> Vec<Predicate<'_>> {
    let mut preds: Vec<Predicate<'_>> = Vec::new();

    if let Some(domain) = criteria.domain() {
        preds.push(Box::new(move |r: &Record| r.domain == domain));
    }
    if let Some(url) = criteria.url() {
        if criteria.exact_url {
            preds.push(Box::new(move |r: &Record| r.url == url));
        } else {
            let needle = url.to_lowercase();
            preds.push(Box::new(move |r: &Record| r.url.to_lowercase().contains(&needle)));
        }
    }
    if let Some(from) = criteria.date_from {
        preds.push(Box::new(move |r: &Record| r.day() >= from));
    }
    if let Some(to) = criteria.date_to {
        preds.push(Box::new(move |r: &Record| r.day() <= to));
    }
    if let Some(metric) = criteria.metric() {
        preds.push(Box::new(move |r: &Record| r.metric(metric).is_some()));
    }
    if !criteria.devices.is_empty() {
        let devices = &criteria.devices;
        preds.push(Box::new(move |r: &Record| {
            r.device.as_ref().is_some_and(|d| devices.contains(d))
        }));
    }
    if !criteria.page_types.is_empty() {
        let page_types = &criteria.page_types;
        preds.push(Box::new(move |r: &Record| {
            r.page_type.as_ref().is_some_and(|p| page_types.contains(p))
        }));
    }

    preds
}

/// Return the rows of `table` passing every active constraint.
///
/// Constraints combine by logical AND. An empty criteria object returns a
/// copy of the input. Asking for a metric the table does not carry is an
/// error rather than an empty result.
pub fn filter(table: &Table, criteria: &FilterCriteria) -> Result<Table> {
    if let Some(metric) = criteria.metric() {
        if !table.has_metric(metric) {
            return Err(DashboardError::UnknownMetric(metric.to_string()));
        }
    }

    let preds = predicates(criteria);
    if preds.is_empty() {
        return Ok(table.clone());
    }

    let records: Vec<Record> = table
        .records
        .iter()
        .filter(|r| preds.iter().all(|p| p(r)))
        .cloned()
        .collect();

    log::debug!(
        "filter kept {} of {} rows ({} active constraints)",
        records.len(),
        table.len(),
        preds.len()
    );

    Ok(table.with_records(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::test_support::{record, table};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sample() -> Table {
        let mut rows = vec![
            record("2024-01-01", ".sk", "https://a.sk/News/1", &[("LCP", 1000.0)]),
            record("2024-01-02", ".sk", "https://a.sk/news/2", &[]),
            record("2024-01-03", ".cz", "https://a.cz/news/1", &[("LCP", 3000.0)]),
            record("2024-01-04", ".sk", "https://a.sk/sport", &[("LCP", 4000.0)]),
        ];
        rows[0].device = Some("mobile".into());
        rows[1].device = Some("desktop".into());
        rows[2].device = Some("mobile".into());
        rows[0].page_type = Some("article".into());
        rows[3].page_type = Some("section".into());
        table(rows, &["LCP", "CLS"])
    }

    #[test]
    fn empty_criteria_is_identity() {
        let t = sample();
        assert_eq!(filter(&t, &FilterCriteria::default()).unwrap(), t);

        let blank = FilterCriteria {
            domain: Some(String::new()),
            url: Some(String::new()),
            metric: Some(String::new()),
            ..Default::default()
        };
        assert!(blank.is_empty());
        assert_eq!(filter(&t, &blank).unwrap(), t);
    }

    #[test]
    fn domain_filter_keeps_only_that_domain() {
        let criteria = FilterCriteria {
            domain: Some(".sk".into()),
            ..Default::default()
        };
        let out = filter(&sample(), &criteria).unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.records.iter().all(|r| r.domain == ".sk"));
    }

    #[test]
    fn exact_url_is_subset_of_substring_match() {
        let mut criteria = FilterCriteria {
            url: Some("https://a.sk/news/2".into()),
            exact_url: true,
            ..Default::default()
        };
        let exact = filter(&sample(), &criteria).unwrap();
        assert_eq!(exact.len(), 1);
        assert!(exact.records.iter().all(|r| r.url == "https://a.sk/news/2"));

        criteria.exact_url = false;
        let loose = filter(&sample(), &criteria).unwrap();
        assert!(exact.records.iter().all(|r| loose.records.contains(r)));
    }

    #[test]
    fn substring_match_ignores_case() {
        let criteria = FilterCriteria {
            url: Some("NEWS".into()),
            ..Default::default()
        };
        let out = filter(&sample(), &criteria).unwrap();
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn substring_match_is_literal() {
        let criteria = FilterCriteria {
            url: Some("a.sk/news/.".into()),
            ..Default::default()
        };
        assert!(filter(&sample(), &criteria).unwrap().is_empty());
    }

    #[test]
    fn date_range_is_inclusive_on_both_ends() {
        let mut rows = sample().records;
        rows[1].date = d("2024-01-02").and_hms_opt(23, 59, 59).unwrap();
        let t = table(rows, &["LCP"]);
        let criteria = FilterCriteria {
            date_from: Some(d("2024-01-02")),
            date_to: Some(d("2024-01-03")),
            ..Default::default()
        };
        let out = filter(&t, &criteria).unwrap();
        let days: Vec<String> = out.records.iter().map(|r| r.day().to_string()).collect();
        assert_eq!(days, vec!["2024-01-02", "2024-01-03"]);
    }

    #[test]
    fn metric_filter_drops_nulls() {
        let criteria = FilterCriteria {
            metric: Some("LCP".into()),
            ..Default::default()
        };
        let out = filter(&sample(), &criteria).unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.records.iter().all(|r| r.metric("LCP").is_some()));
    }

    #[test]
    fn unknown_metric_is_an_error() {
        let criteria = FilterCriteria {
            metric: Some("FOO".into()),
            ..Default::default()
        };
        assert!(matches!(
            filter(&sample(), &criteria),
            Err(DashboardError::UnknownMetric(m)) if m == "FOO"
        ));
    }

    #[test]
    fn devices_and_page_types_are_set_membership() {
        let criteria = FilterCriteria {
            devices: ["mobile".to_string()].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(filter(&sample(), &criteria).unwrap().len(), 2);

        let criteria = FilterCriteria {
            devices: ["mobile".to_string()].into_iter().collect(),
            page_types: ["article".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let out = filter(&sample(), &criteria).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.records[0].url, "https://a.sk/News/1");
    }

    #[test]
    fn combined_constraints_and_together() {
        let criteria = FilterCriteria {
            domain: Some(".sk".into()),
            url: Some("news".into()),
            metric: Some("LCP".into()),
            ..Default::default()
        };
        let out = filter(&sample(), &criteria).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.records[0].day(), d("2024-01-01"));
    }
}
