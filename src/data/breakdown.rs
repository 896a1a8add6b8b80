use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::model::{MetricSpec, Table, PAGE_TYPE_COLUMN};

/// Label of the catch-all bucket.
pub const OTHER: &str = "other";

// ---------------------------------------------------------------------------
// Value counts and top-N bucketing
// ---------------------------------------------------------------------------

/// Count the non-null values of a categorical column.
///
/// Sorted by count descending, ties by label ascending, so the order is
/// deterministic.
pub fn value_counts(table: &Table, column: &str) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for r in &table.records {
        if let Some(v) = r.category(column) {
            *counts.entry(v).or_default() += 1;
        }
    }
    let mut counts: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

/// Keep the first `n` entries of `counts` and sum the rest into a trailing
/// [`OTHER`] bucket.
///
/// `counts` is expected in [`value_counts`] order. A category that is itself
/// labelled "other" and falls outside the top N merges with the bucket. The
/// bucket is omitted when nothing remains.
pub fn bucket_top_n(counts: &[(String, usize)], n: usize) -> Vec<(String, usize)> {
    let n = n.min(counts.len());
    let mut out: Vec<(String, usize)> = counts[..n].to_vec();

    let rest: usize = counts[n..].iter().map(|(_, c)| c).sum();
    if rest > 0 {
        match out.iter_mut().find(|(label, _)| label.as_str() == OTHER) {
            Some((_, c)) => *c += rest,
            None => out.push((OTHER.to_string(), rest)),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Score classification
// ---------------------------------------------------------------------------

/// Web Vitals rating of a single measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Score {
    Good,
    NeedsImprovement,
    Poor,
}

impl Score {
    /// `<= first` is good, `<= second` needs improvement, anything above is poor.
    pub fn classify(value: f64, spec: &MetricSpec) -> Score {
        if value <= spec.first_breakpoint {
            Score::Good
        } else if value <= spec.second_breakpoint {
            Score::NeedsImprovement
        } else {
            Score::Poor
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Score::Good => "good",
            Score::NeedsImprovement => "needs improvement",
            Score::Poor => "poor",
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Score distribution of one page-type category.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CategoryScores {
    pub label: String,
    pub counts: BTreeMap<Score, usize>,
}

impl CategoryScores {
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn count(&self, score: Score) -> usize {
        self.counts.get(&score).copied().unwrap_or(0)
    }

    /// Share of `score` in this category, `0.0` for an empty category.
    pub fn fraction(&self, score: Score) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.count(score) as f64 / total as f64,
        }
    }
}

/// Rate every non-null value of `spec.name` and tally it under its page type.
///
/// Page types outside `top_labels`, and rows without a page type, are
/// tallied under [`OTHER`]. Categories come back in `top_labels` order with
/// "other" last; categories with no rated rows are omitted.
pub fn score_breakdown(table: &Table, spec: &MetricSpec, top_labels: &[String]) -> Vec<CategoryScores> {
    let mut tallies: HashMap<&str, CategoryScores> = HashMap::new();

    for r in &table.records {
        let Some(value) = r.metric(&spec.name) else {
            continue;
        };
        let label = r
            .category(PAGE_TYPE_COLUMN)
            .filter(|p| top_labels.iter().any(|t| t.as_str() == *p))
            .unwrap_or(OTHER);
        let entry = tallies.entry(label).or_insert_with(|| CategoryScores {
            label: label.to_string(),
            ..Default::default()
        });
        *entry.counts.entry(Score::classify(value, spec)).or_default() += 1;
    }

    let mut out: Vec<CategoryScores> = top_labels
        .iter()
        .filter(|l| l.as_str() != OTHER)
        .filter_map(|l| tallies.remove(l.as_str()))
        .collect();
    if let Some(other) = tallies.remove(OTHER) {
        out.push(other);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::test_support::{record, table};
    use crate::data::model::MetricUnit;

    fn counts(pairs: &[(&str, usize)]) -> Vec<(String, usize)> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn lcp() -> MetricSpec {
        MetricSpec::new("LCP", MetricUnit::Milliseconds, 2500.0, 4000.0)
    }

    fn with_page_type(date: &str, page_type: Option<&str>, lcp: f64) -> crate::data::model::Record {
        let mut r = record(date, ".sk", "/", &[("LCP", lcp)]);
        r.page_type = page_type.map(str::to_string);
        r
    }

    #[test]
    fn value_counts_sorts_by_count_then_label() {
        let t = table(
            vec![
                with_page_type("2024-01-01", Some("b"), 1.0),
                with_page_type("2024-01-01", Some("a"), 1.0),
                with_page_type("2024-01-01", Some("c"), 1.0),
                with_page_type("2024-01-01", Some("c"), 1.0),
                with_page_type("2024-01-01", None, 1.0),
            ],
            &["LCP"],
        );
        assert_eq!(
            value_counts(&t, PAGE_TYPE_COLUMN),
            counts(&[("c", 2), ("a", 1), ("b", 1)])
        );
    }

    #[test]
    fn bucket_top_n_sums_the_tail() {
        let input = counts(&[("article", 10), ("home", 5), ("gallery", 3), ("video", 2)]);
        let out = bucket_top_n(&input, 2);
        assert_eq!(out, counts(&[("article", 10), ("home", 5), ("other", 5)]));
        assert!(out.len() <= 3);
        let total: usize = out.iter().map(|(_, c)| c).sum();
        assert_eq!(total, 20);
    }

    #[test]
    fn bucket_top_n_without_tail_has_no_other() {
        let input = counts(&[("article", 10), ("home", 5)]);
        assert_eq!(bucket_top_n(&input, 5), input);
        assert!(bucket_top_n(&[], 3).is_empty());
    }

    #[test]
    fn bucket_top_n_merges_literal_other() {
        let input = counts(&[("other", 7), ("home", 5), ("video", 2)]);
        let out = bucket_top_n(&input, 1);
        assert_eq!(out, counts(&[("other", 14)]));
        let total: usize = out.iter().map(|(_, c)| c).sum();
        assert_eq!(total, 14);
    }

    #[test]
    fn classify_uses_inclusive_breakpoints() {
        let spec = lcp();
        assert_eq!(Score::classify(2500.0, &spec), Score::Good);
        assert_eq!(Score::classify(2500.1, &spec), Score::NeedsImprovement);
        assert_eq!(Score::classify(4000.0, &spec), Score::NeedsImprovement);
        assert_eq!(Score::classify(4000.1, &spec), Score::Poor);
    }

    #[test]
    fn score_breakdown_folds_tail_and_nulls_into_other() {
        let t = table(
            vec![
                with_page_type("2024-01-01", Some("article"), 1000.0),
                with_page_type("2024-01-01", Some("article"), 5000.0),
                with_page_type("2024-01-01", Some("video"), 3000.0),
                with_page_type("2024-01-01", None, 1000.0),
            ],
            &["LCP"],
        );
        let out = score_breakdown(&t, &lcp(), &["article".to_string()]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].label, "article");
        assert_eq!(out[0].count(Score::Good), 1);
        assert_eq!(out[0].count(Score::Poor), 1);
        assert_eq!(out[0].fraction(Score::Good), 0.5);
        assert_eq!(out[1].label, OTHER);
        assert_eq!(out[1].total(), 2);
        assert_eq!(out[1].count(Score::NeedsImprovement), 1);
    }
}
