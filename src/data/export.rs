use std::io::Write;
use std::path::Path;

use super::model::{Table, KEY_COLUMNS};
use crate::error::{DashboardError, Result};

/// UTF-8 byte-order mark, so spreadsheet tools pick the right encoding.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Write `table` as CSV restricted to the key columns plus `metrics`.
///
/// Layout: BOM, then `date,domain,url,device,page_type,<metrics...>`, one
/// line per record. Nulls are written as empty fields.
pub fn write_csv<W: Write>(table: &Table, metrics: &[&str], mut out: W) -> Result<()> {
    for m in metrics {
        if !table.has_metric(m) {
            return Err(DashboardError::UnknownMetric(m.to_string()));
        }
    }

    out.write_all(UTF8_BOM)?;
    let mut writer = csv::Writer::from_writer(out);

    let header: Vec<&str> = KEY_COLUMNS.iter().copied().chain(metrics.iter().copied()).collect();
    writer.write_record(&header)?;

    for r in &table.records {
        let mut row: Vec<String> = vec![
            r.date.format("%Y-%m-%d %H:%M:%S").to_string(),
            r.domain.clone(),
            r.url.clone(),
            r.device.clone().unwrap_or_default(),
            r.page_type.clone().unwrap_or_default(),
        ];
        row.extend(
            metrics
                .iter()
                .map(|m| r.metric(m).map(|v| v.to_string()).unwrap_or_default()),
        );
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

/// [`write_csv`] into an in-memory buffer.
pub fn to_csv_bytes(table: &Table, metrics: &[&str]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_csv(table, metrics, &mut buf)?;
    Ok(buf)
}

/// [`write_csv`] into a file, replacing it if it exists.
pub fn save_csv(table: &Table, metrics: &[&str], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_csv(table, metrics, std::io::BufWriter::new(file))?;
    log::info!("Exported {} rows to {}", table.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::test_support::{record, table};

    fn sample() -> Table {
        let mut a = record("2024-01-01", ".sk", "https://a.sk/x", &[("LCP", 1200.0), ("CLS", 0.05)]);
        a.device = Some("mobile".into());
        a.page_type = Some("article".into());
        let b = record("2024-01-02", ".sk", "https://a.sk/y", &[("CLS", 0.3)]);
        table(vec![a, b], &["LCP", "CLS"])
    }

    #[test]
    fn export_starts_with_bom_and_keeps_only_selected_metric() {
        let bytes = to_csv_bytes(&sample(), &["LCP"]).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));

        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "date,domain,url,device,page_type,LCP");
        assert_eq!(lines[1], "2024-01-01 00:00:00,.sk,https://a.sk/x,mobile,article,1200");
        assert_eq!(lines[2], "2024-01-02 00:00:00,.sk,https://a.sk/y,,,");
        assert!(!text.contains("CLS"));
    }

    #[test]
    fn export_all_metrics_in_order() {
        let bytes = to_csv_bytes(&sample(), &["LCP", "CLS"]).unwrap();
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        assert!(text.starts_with("date,domain,url,device,page_type,LCP,CLS\n"));
        assert!(text.contains(",1200,0.05\n"));
    }

    #[test]
    fn export_rejects_unknown_metric() {
        assert!(matches!(
            to_csv_bytes(&sample(), &["INP"]),
            Err(DashboardError::UnknownMetric(_))
        ));
    }

    #[test]
    fn save_csv_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        save_csv(&sample(), &["CLS"], &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        assert_eq!(String::from_utf8_lossy(&bytes).lines().count(), 3);
    }
}
