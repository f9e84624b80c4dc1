//! Offline reading of an averages file: the best configuration for every metric, the
//! speedup indexing buys each layout, and every metric compared across data models.

use crate::{
    model::{DataModel, Layout},
    record::AverageRecord,
};
use std::{collections::BTreeMap, fmt};

/// indexed timings below this many milliseconds are treated as this value when dividing
pub const SPEEDUP_FLOOR_MS: f64 = 0.1;

/// One averaged timing column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    Insert,
    Query1,
    Query2,
    Query3,
}

impl Metric {
    pub const ALL: [Metric; 4] = [Metric::Insert, Metric::Query1, Metric::Query2, Metric::Query3];

    pub fn of(self, record: &AverageRecord) -> u64 {
        match self {
            Self::Insert => record.avg_insert_time_ms,
            Self::Query1 => record.avg_query1_time_ms,
            Self::Query2 => record.avg_query2_time_ms,
            Self::Query3 => record.avg_query3_time_ms,
        }
    }

    /// header of the column in the averages file
    pub fn column(self) -> &'static str {
        match self {
            Self::Insert => "avgInsertTimeMs",
            Self::Query1 => "avgQuery1TimeMs",
            Self::Query2 => "avgQuery2TimeMs",
            Self::Query3 => "avgQuery3TimeMs",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => f.write_str("Insert"),
            Self::Query1 => f.write_str("Query 1"),
            Self::Query2 => f.write_str("Query 2"),
            Self::Query3 => f.write_str("Query 3"),
        }
    }
}

/// Fastest averaged configuration for a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Best {
    pub metric: Metric,
    pub data_model: DataModel,
    pub total_documents: usize,
    pub time_ms: u64,
}

/// Ratio of plain to indexed timing for one layout at one sweep point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Speedup {
    pub illness_cases: usize,
    pub documents_per_case: usize,
    pub total_documents: usize,
    pub layout: Layout,
    pub factor: f64,
}

/// One averaged timing of a data model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub illness_cases: usize,
    pub documents_per_case: usize,
    pub total_documents: usize,
    pub time_ms: u64,
}

/// The lowest average of every metric; the first record wins ties.
pub fn summary(records: &[AverageRecord]) -> Vec<Best> {
    Metric::ALL
        .into_iter()
        .filter_map(|metric| {
            records
                .iter()
                .min_by_key(|record| metric.of(record))
                .map(|record| Best {
                    metric,
                    data_model: record.data_model,
                    total_documents: record.total_documents,
                    time_ms: metric.of(record),
                })
        })
        .collect()
}

/// Plain over indexed timing for every (case count, documents per case, layout) where
/// both variants were measured, ordered by that key.
pub fn speedup(records: &[AverageRecord], metric: Metric) -> Vec<Speedup> {
    let mut pairs: BTreeMap<(usize, usize, Layout), (Option<&AverageRecord>, Option<&AverageRecord>)> =
        BTreeMap::new();

    for record in records {
        let config = record.config();
        let pair = pairs
            .entry((
                config.illness_cases,
                config.documents_per_case,
                config.data_model.layout(),
            ))
            .or_default();

        if config.data_model.indexed() {
            pair.1 = Some(record);
        } else {
            pair.0 = Some(record);
        }
    }

    pairs
        .into_iter()
        .filter_map(|((illness_cases, documents_per_case, layout), pair)| match pair {
            (Some(plain), Some(indexed)) => Some(Speedup {
                illness_cases,
                documents_per_case,
                total_documents: plain.total_documents,
                layout,
                factor: metric.of(plain) as f64 / (metric.of(indexed) as f64).max(SPEEDUP_FLOOR_MS),
            }),
            _ => None,
        })
        .collect()
}

/// Every data model's timings for a metric, ordered by dataset size
pub fn compare(records: &[AverageRecord], metric: Metric) -> BTreeMap<DataModel, Vec<Point>> {
    let mut series: BTreeMap<DataModel, Vec<Point>> = BTreeMap::new();

    for record in records {
        series.entry(record.data_model).or_default().push(Point {
            illness_cases: record.illness_cases,
            documents_per_case: record.documents_per_case,
            total_documents: record.total_documents,
            time_ms: metric.of(record),
        });
    }

    for points in series.values_mut() {
        points.sort_by_key(|point| (point.total_documents, point.illness_cases));
    }

    series
}

/// Text report over an averages file, printed by `tagbench summary`
#[derive(Debug, Clone, Copy)]
pub struct Report<'a> {
    records: &'a [AverageRecord],
}

impl<'a> Report<'a> {
    pub fn new(records: &'a [AverageRecord]) -> Self {
        Self { records }
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== SUMMARY STATISTICS ===")?;
        if self.records.is_empty() {
            return writeln!(f, "\nNo averaged results");
        }

        for best in summary(self.records) {
            writeln!(
                f,
                "\nBest {} Performance: {} with {} documents, {} ms",
                best.metric, best.data_model, best.total_documents, best.time_ms
            )?;
        }

        writeln!(f, "\n=== INDEXING SPEEDUP ({}) ===\n", Metric::Query2)?;
        let speedups = speedup(self.records, Metric::Query2);
        if speedups.is_empty() {
            writeln!(f, "No layout was measured both with and without indexes")?;
        }
        for entry in speedups {
            writeln!(
                f,
                "{} cases, {} docs/case ({} documents): {} {:.2}x",
                entry.illness_cases,
                entry.documents_per_case,
                entry.total_documents,
                entry.layout,
                entry.factor
            )?;
        }

        for metric in Metric::ALL {
            writeln!(f, "\n=== {metric} BY DATA MODEL ({}) ===\n", metric.column())?;
            for (data_model, points) in compare(self.records, metric) {
                let points = points
                    .iter()
                    .map(|point| format!("{} docs {} ms", point.total_documents, point.time_ms))
                    .collect::<Vec<_>>();
                writeln!(f, "{data_model}: {}", points.join(", "))?;
            }
        }

        Ok(())
    }
}
