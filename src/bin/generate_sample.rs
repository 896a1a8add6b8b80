//! Writes deterministic sample result sets into `data/` so the dashboards can
//! be tried without a warehouse export.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use chrono::{Duration, NaiveDate};
use parquet::arrow::ArrowWriter;

const DAYS: i64 = 28;
const ROWS_PER_DAY: usize = 60;

const DOMAINS: [&str; 2] = [".sk", ".cz"];
const DEVICES: [&str; 3] = ["mobile", "desktop", "tablet"];
const PAGE_TYPES: [(&str, f64); 7] = [
    ("article", 0.35),
    ("home", 0.2),
    ("section", 0.15),
    ("gallery", 0.1),
    ("video", 0.08),
    ("search", 0.07),
    ("author", 0.05),
];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[(self.next_u64() % items.len() as u64) as usize]
    }

    fn weighted(&mut self, items: &[(&'static str, f64)]) -> &'static str {
        let mut roll = self.next_f64();
        for &(item, weight) in items {
            if roll < weight {
                return item;
            }
            roll -= weight;
        }
        items[items.len() - 1].0
    }

    /// Log-normal sample around `median`, the shape timing metrics usually have.
    fn log_normal(&mut self, median: f64, spread: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        median * (spread * z).exp()
    }

    /// `Some(value)` except for a `null_rate` share of draws.
    fn sometimes(&mut self, null_rate: f64, value: f64) -> Option<f64> {
        (self.next_f64() >= null_rate).then_some(value)
    }
}

/// Key columns shared by both result sets.
struct Keys {
    dates: Vec<i64>,
    domains: Vec<&'static str>,
    urls: Vec<String>,
    devices: Vec<&'static str>,
    page_types: Vec<&'static str>,
}

impl Keys {
    fn generate(rng: &mut SimpleRng) -> Keys {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();
        let mut keys = Keys {
            dates: Vec::new(),
            domains: Vec::new(),
            urls: Vec::new(),
            devices: Vec::new(),
            page_types: Vec::new(),
        };
        for day in 0..DAYS {
            for _ in 0..ROWS_PER_DAY {
                let seconds = (rng.next_f64() * 86_400.0) as i64;
                let at = start + Duration::days(day) + Duration::seconds(seconds);
                let domain = rng.pick(&DOMAINS);
                let page_type = rng.weighted(&PAGE_TYPES);
                let slug = rng.next_u64() % 40;

                keys.dates.push(at.and_utc().timestamp_micros());
                keys.domains.push(domain);
                keys.urls
                    .push(format!("https://www.example{domain}/{page_type}/{slug}"));
                keys.devices.push(rng.pick(&DEVICES));
                keys.page_types.push(page_type);
            }
        }
        keys
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::new("date", DataType::Timestamp(TimeUnit::Microsecond, None), false),
            Field::new("domain", DataType::Utf8, false),
            Field::new("url", DataType::Utf8, false),
            Field::new("device", DataType::Utf8, true),
            Field::new("page_type", DataType::Utf8, true),
        ]
    }

    fn columns(&self) -> Vec<ArrayRef> {
        vec![
            Arc::new(TimestampMicrosecondArray::from(self.dates.clone())),
            Arc::new(StringArray::from(self.domains.clone())),
            Arc::new(StringArray::from_iter_values(&self.urls)),
            Arc::new(StringArray::from(self.devices.clone())),
            Arc::new(StringArray::from(self.page_types.clone())),
        ]
    }
}

fn web_vitals(rng: &mut SimpleRng, keys: &Keys) -> Result<RecordBatch> {
    // (name, median, spread, null rate)
    let metrics: [(&str, f64, f64, f64); 6] = [
        ("CLS", 0.08, 0.9, 0.1),
        ("FCP", 1600.0, 0.45, 0.05),
        ("FID", 60.0, 0.8, 0.4),
        ("INP", 180.0, 0.6, 0.3),
        ("LCP", 2300.0, 0.5, 0.05),
        ("TTFB", 700.0, 0.55, 0.1),
    ];

    let mut fields = keys.fields();
    let mut columns = keys.columns();
    for (name, median, spread, null_rate) in metrics {
        let values: Vec<Option<f64>> = keys
            .devices
            .iter()
            .map(|device| {
                let slow = if *device == "mobile" { 1.3 } else { 1.0 };
                let v = rng.log_normal(median * slow, spread);
                rng.sometimes(null_rate, v)
            })
            .collect();
        fields.push(Field::new(name, DataType::Float64, true));
        columns.push(Arc::new(Float64Array::from(values)));
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .context("building web vitals batch")
}

fn load_and_render(rng: &mut SimpleRng, keys: &Keys) -> Result<RecordBatch> {
    let mut page_load = Vec::with_capacity(keys.dates.len());
    let mut render = Vec::with_capacity(keys.dates.len());
    for _ in &keys.dates {
        let load = rng.log_normal(2.4, 0.4);
        page_load.push(rng.sometimes(0.02, load));
        let share = 0.3 + 0.4 * rng.next_f64();
        render.push(rng.sometimes(0.1, load * share));
    }

    let mut fields = keys.fields();
    let mut columns = keys.columns();
    fields.push(Field::new("page_load_time", DataType::Float64, true));
    columns.push(Arc::new(Float64Array::from(page_load)));
    fields.push(Field::new("render_time", DataType::Float64, true));
    columns.push(Arc::new(Float64Array::from(render)));

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .context("building load/render batch")
}

fn write_parquet(batch: &RecordBatch, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;

    println!("Wrote {} rows to {}", batch.num_rows(), path.display());
    println!("{}", pretty_format_batches(&[batch.slice(0, batch.num_rows().min(5))])?);
    Ok(())
}

fn main() -> Result<()> {
    let out_dir = Path::new("data");
    std::fs::create_dir_all(out_dir).context("creating data directory")?;

    let mut rng = SimpleRng::new(42);
    let keys = Keys::generate(&mut rng);

    write_parquet(&web_vitals(&mut rng, &keys)?, &out_dir.join("web_vitals.parquet"))?;
    write_parquet(
        &load_and_render(&mut rng, &keys)?,
        &out_dir.join("load_and_render_time.parquet"),
    )?;
    Ok(())
}
