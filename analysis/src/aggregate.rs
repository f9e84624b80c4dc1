use crate::{
    model::BenchmarkConfig,
    record::{AverageRecord, TrialResult},
};
use chrono::{SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Failed to read or write CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Failed to persist {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Keeps every raw trial result and rewrites both output files after each new one, so an
/// interrupted sweep still leaves consistent partial output behind
#[derive(Debug)]
pub struct Aggregator {
    results_path: PathBuf,
    averages_path: PathBuf,
    results: Vec<TrialResult>,
}

impl Aggregator {
    pub fn new(results_path: impl Into<PathBuf>, averages_path: impl Into<PathBuf>) -> Self {
        Self {
            results_path: results_path.into(),
            averages_path: averages_path.into(),
            results: Vec::new(),
        }
    }

    pub fn results(&self) -> &[TrialResult] {
        &self.results
    }

    pub fn results_path(&self) -> &Path {
        &self.results_path
    }

    pub fn averages_path(&self) -> &Path {
        &self.averages_path
    }

    /// record a new trial and persist the raw series plus freshly recomputed averages
    pub fn push(&mut self, result: TrialResult) -> Result<Vec<AverageRecord>, AnalysisError> {
        debug!(config = %result.config(), run = result.run, "Aggregating trial result");
        self.results.push(result);

        let averages = averages(&self.results, &now());

        write_csv(&self.results_path, &self.results)?;
        info!(
            path = %self.results_path.display(),
            "Results written ({} entries)",
            self.results.len()
        );

        write_csv(&self.averages_path, &averages)?;
        info!(
            path = %self.averages_path.display(),
            "Averages written ({} entries)",
            averages.len()
        );

        Ok(averages)
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// integer mean rounded half-up
fn rounded_mean<I: Iterator<Item = u64>>(values: I, count: usize) -> u64 {
    let count = count as u128;
    let sum: u128 = values.map(u128::from).sum();

    ((sum * 2 + count) / (count * 2)) as u64
}

/// Group results by configuration (ascending) and average every timing
pub fn averages(results: &[TrialResult], timestamp: &str) -> Vec<AverageRecord> {
    let mut grouped: BTreeMap<BenchmarkConfig, Vec<&TrialResult>> = BTreeMap::new();

    for result in results {
        grouped.entry(result.config()).or_default().push(result);
    }

    grouped
        .into_iter()
        .map(|(config, group)| {
            let runs = group.len();

            AverageRecord {
                illness_cases: config.illness_cases,
                documents_per_case: config.documents_per_case,
                total_documents: group[0].total_documents,
                data_model: config.data_model,
                avg_insert_time_ms: rounded_mean(group.iter().map(|r| r.insert_time_ms), runs),
                avg_query1_time_ms: rounded_mean(group.iter().map(|r| r.query1_time_ms), runs),
                avg_query2_time_ms: rounded_mean(group.iter().map(|r| r.query2_time_ms), runs),
                avg_query3_time_ms: rounded_mean(group.iter().map(|r| r.query3_time_ms), runs),
                num_runs: runs,
                timestamp: timestamp.to_owned(),
            }
        })
        .collect()
}

/// load a raw results file written by `Aggregator`
pub fn read_results(path: &Path) -> Result<Vec<TrialResult>, AnalysisError> {
    read_csv(path)
}

/// load an averages file written by `Aggregator` or `tagbench aggregate`
pub fn read_averages(path: &Path) -> Result<Vec<AverageRecord>, AnalysisError> {
    read_csv(path)
}

fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, AnalysisError> {
    csv::Reader::from_path(path)?
        .deserialize()
        .try_fold(Vec::new(), |mut init, record| {
            init.push(record?);

            Ok::<Vec<T>, AnalysisError>(init)
        })
}

/// write all rows (header first) to a sibling temp file and move it into place
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), AnalysisError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut writer = csv::Writer::from_path(&tmp)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(|source| AnalysisError::Io {
        path: tmp.clone(),
        source,
    })?;
    drop(writer);

    fs::rename(&tmp, path).map_err(|source| AnalysisError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataModel;
    use proptest::prelude::*;

    fn trial(cases: usize, model: DataModel, run: usize, timings: [u64; 4]) -> TrialResult {
        TrialResult {
            illness_cases: cases,
            documents_per_case: 5,
            total_documents: cases * 5 + run,
            data_model: model,
            insert_time_ms: timings[0],
            query1_time_ms: timings[1],
            query2_time_ms: timings[2],
            query3_time_ms: timings[3],
            run,
            timestamp: "2024-01-01T00:00:00.000Z".to_owned(),
        }
    }

    #[test]
    fn rounds_half_up() {
        assert_eq!(rounded_mean([1, 2].into_iter(), 2), 2);
        assert_eq!(rounded_mean([1, 1, 2].into_iter(), 3), 1);
        assert_eq!(rounded_mean([1, 2, 2].into_iter(), 3), 2);
        assert_eq!(rounded_mean([0].into_iter(), 1), 0);
    }

    #[test]
    fn groups_per_configuration() {
        let results = vec![
            trial(10, DataModel::Jsonb, 1, [10, 1, 2, 3]),
            trial(10, DataModel::SeparateTable, 1, [20, 4, 5, 6]),
            trial(10, DataModel::Jsonb, 2, [13, 2, 2, 4]),
        ];

        let averages = averages(&results, "now");

        assert_eq!(averages.len(), 2);
        let jsonb = averages
            .iter()
            .find(|avg| avg.data_model == DataModel::Jsonb)
            .unwrap();
        assert_eq!(jsonb.num_runs, 2);
        assert_eq!(jsonb.avg_insert_time_ms, 12);
        assert_eq!(jsonb.avg_query1_time_ms, 2);
        assert_eq!(jsonb.avg_query2_time_ms, 2);
        assert_eq!(jsonb.avg_query3_time_ms, 4);
        // taken from the first trial of the group
        assert_eq!(jsonb.total_documents, 51);
        assert_eq!(jsonb.timestamp, "now");
    }

    #[test]
    fn writes_expected_headers() {
        let dir = tempfile::tempdir().unwrap();
        let mut aggregator = Aggregator::new(
            dir.path().join("results.csv"),
            dir.path().join("averages.csv"),
        );

        aggregator
            .push(trial(1_000, DataModel::SeparateColumnsIndexed, 1, [5, 6, 7, 8]))
            .unwrap();

        let raw = fs::read_to_string(aggregator.results_path()).unwrap();
        let averaged = fs::read_to_string(aggregator.averages_path()).unwrap();

        assert_eq!(
            raw.lines().next().unwrap(),
            "illnessCases,documentsPerCase,totalDocuments,dataModel,insertTimeMs,query1TimeMs,query2TimeMs,query3TimeMs,run,timestamp"
        );
        assert!(raw
            .lines()
            .nth(1)
            .unwrap()
            .starts_with("1000,5,5001,separate_columns_indexed,5,6,7,8,1,"));
        assert_eq!(
            averaged.lines().next().unwrap(),
            "illnessCases,documentsPerCase,totalDocuments,dataModel,avgInsertTimeMs,avgQuery1TimeMs,avgQuery2TimeMs,avgQuery3TimeMs,numRuns,timestamp"
        );
        assert!(!dir.path().join("results.csv.tmp").exists());
    }

    #[test]
    fn every_push_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut aggregator = Aggregator::new(
            dir.path().join("results.csv"),
            dir.path().join("averages.csv"),
        );

        for run in 1..=3 {
            aggregator
                .push(trial(10, DataModel::JsonbIndexed, run, [run as u64; 4]))
                .unwrap();

            assert_eq!(read_results(aggregator.results_path()).unwrap().len(), run);
        }
    }

    #[test]
    fn raw_file_reproduces_incremental_averages() {
        let dir = tempfile::tempdir().unwrap();
        let mut aggregator = Aggregator::new(
            dir.path().join("results.csv"),
            dir.path().join("averages.csv"),
        );
        let mut incremental = Vec::new();

        for (run, model) in [DataModel::Jsonb, DataModel::SeparateTable, DataModel::Jsonb]
            .into_iter()
            .enumerate()
        {
            incremental = aggregator
                .push(trial(100, model, run + 1, [7 * run as u64, 3, 1 + run as u64, 9]))
                .unwrap();
        }

        let reread = read_results(aggregator.results_path()).unwrap();
        assert_eq!(reread, aggregator.results());

        let stamp = incremental[0].timestamp.clone();
        assert_eq!(averages(&reread, &stamp), incremental);
        assert_eq!(read_averages(aggregator.averages_path()).unwrap(), incremental);
    }

    proptest! {
        #[test]
        fn averages_match_arithmetic_mean(
            timings in proptest::collection::vec((0u64..100_000, 0u64..20_000, 0u64..20_000, 0u64..20_000), 1..12),
        ) {
            let results = timings
                .iter()
                .enumerate()
                .map(|(run, (a, b, c, d))| trial(1_000, DataModel::SeparateTable, run + 1, [*a, *b, *c, *d]))
                .collect::<Vec<_>>();

            let averages = averages(&results, "t");
            prop_assert_eq!(averages.len(), 1);

            let n = results.len() as f64;
            let mean = |f: fn(&TrialResult) -> u64| {
                (results.iter().map(|r| f(r) as f64).sum::<f64>() / n + 0.5).floor() as u64
            };

            prop_assert_eq!(averages[0].num_runs, results.len());
            prop_assert_eq!(averages[0].avg_insert_time_ms, mean(|r| r.insert_time_ms));
            prop_assert_eq!(averages[0].avg_query1_time_ms, mean(|r| r.query1_time_ms));
            prop_assert_eq!(averages[0].avg_query2_time_ms, mean(|r| r.query2_time_ms));
            prop_assert_eq!(averages[0].avg_query3_time_ms, mean(|r| r.query3_time_ms));
        }
    }
}
