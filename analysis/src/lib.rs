//! Result records shared between the sweep runner and offline analysis, plus the
//! incremental aggregator that keeps the raw and averaged CSV files current, and the
//! summary report over an averages file.

pub mod aggregate;
pub mod model;
pub mod record;
pub mod summary;

pub use aggregate::{averages, read_averages, read_results, write_csv, AnalysisError, Aggregator};
pub use model::{BenchmarkConfig, DataModel, Layout, ParseDataModelError};
pub use record::{AverageRecord, TrialResult};
pub use summary::{compare, speedup, summary, Best, Metric, Point, Report, Speedup, SPEEDUP_FLOOR_MS};
