/// Data layer: core types, loading, filtering and aggregation.
///
/// Architecture:
/// ```text
///  warehouse export (.parquet / .csv / .json)
///        │
///        ▼
///   ┌──────────────────┐
///   │ source + cache    │  query text → Table (time-boxed)
///   └──────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  FilterCriteria → filtered Table
///   └──────────┘
///        │
///        ├──────────────┬───────────────┐
///        ▼              ▼               ▼
///   ┌───────────┐ ┌───────────┐  ┌──────────┐
///   │ aggregate │ │ breakdown │  │  export   │
///   └───────────┘ └───────────┘  └──────────┘
///   date series    top-N, scores   CSV + BOM
/// ```

pub mod aggregate;
pub mod breakdown;
pub mod export;
pub mod filter;
pub mod loader;
pub mod model;
pub mod source;
