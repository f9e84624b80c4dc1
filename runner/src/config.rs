use crate::database::Query;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{fs, io::Error, path::PathBuf, time::Duration};
use tagbench_analysis::DataModel;
use thiserror::Error;
use tracing::{error, warn};

/// widest row any variant binds, the parameter ceiling must hold at least one
const WIDEST_ROW: usize = 60;

#[derive(Error, Debug)]
pub enum ConfigErrors {
    #[error("Failed to read config file")]
    FileNotReadable(#[from] Error),
    #[error("Failed to parse config file: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),
    #[error("Config failed preflight checks")]
    Preflight,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct BenchConfig {
    #[serde(default, alias = "db")]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
    // fixed capacity shared by loading, the query threads and cleanup
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct SweepConfig {
    #[serde(default = "default_illness_cases")]
    pub illness_cases: Vec<usize>,
    #[serde(default = "default_documents_per_case")]
    pub documents_per_case: Vec<usize>,
    #[serde(default = "default_data_models")]
    pub data_models: Vec<DataModel>,
    #[serde(default = "default_runs")]
    pub runs: usize,
    // fixes dataset generation and oracle sampling, fresh entropy otherwise
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    #[serde(default = "default_parameter_limit")]
    pub parameter_limit: usize,
    #[serde(default = "default_large_dataset_threshold")]
    pub large_dataset_threshold: usize,
    #[serde(default = "default_insert_workers")]
    pub insert_workers: usize,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct TimeoutConfig {
    #[serde(default = "default_query_ms")]
    pub query_ms: u64,
    #[serde(default)]
    pub query1_ms: Option<u64>,
    #[serde(default)]
    pub query2_ms: Option<u64>,
    #[serde(default)]
    pub query3_ms: Option<u64>,
    // interrupt the statement instead of letting it run on after the deadline
    #[serde(default)]
    pub cancel_on_timeout: bool,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_results_path")]
    pub results: PathBuf,
    #[serde(default = "default_averages_path")]
    pub averages: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            pool_size: default_pool_size(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            illness_cases: default_illness_cases(),
            documents_per_case: default_documents_per_case(),
            data_models: default_data_models(),
            runs: default_runs(),
            seed: None,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            parameter_limit: default_parameter_limit(),
            large_dataset_threshold: default_large_dataset_threshold(),
            insert_workers: default_insert_workers(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            query_ms: default_query_ms(),
            query1_ms: None,
            query2_ms: None,
            query3_ms: None,
            cancel_on_timeout: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results: default_results_path(),
            averages: default_averages_path(),
        }
    }
}

impl TimeoutConfig {
    pub fn deadline(&self, query: Query) -> Duration {
        let millis = match query {
            Query::Query1 => self.query1_ms,
            Query::Query2 => self.query2_ms,
            Query::Query3 => self.query3_ms,
        };

        Duration::from_millis(millis.unwrap_or(self.query_ms))
    }
}

impl BenchConfig {
    pub fn load(path: &PathBuf) -> Result<Self, ConfigErrors> {
        let contents = fs::read_to_string(path)?;

        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigErrors> {
        // an empty document is a valid config with every default applied
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        Ok(serde_yaml::from_str(contents)?)
    }

    /// Check the config, logging every problem instead of stopping at the first one.
    /// Returns whether any error was found; case counts are normalised in place.
    pub fn preflight_checks(&mut self) -> bool {
        let mut contains_error = false;
        let sweep = &mut self.sweep;

        if sweep.illness_cases.is_empty() {
            error!("sweep.illness_cases is empty, there is nothing to benchmark");
            contains_error = true;
        }
        if sweep.illness_cases.contains(&0) {
            error!("sweep.illness_cases cannot contain 0, no documents could be queried");
            contains_error = true;
        }

        let normalised = sweep
            .illness_cases
            .iter()
            .copied()
            .sorted()
            .dedup()
            .collect_vec();
        if normalised != sweep.illness_cases {
            warn!(
                "sweep.illness_cases is not strictly ascending, sweeping {:?} so smaller sizes run first",
                normalised
            );
            sweep.illness_cases = normalised;
        }

        if sweep.documents_per_case.is_empty() {
            error!("sweep.documents_per_case is empty, there is nothing to benchmark");
            contains_error = true;
        }
        if sweep.documents_per_case.contains(&0) {
            error!("sweep.documents_per_case cannot contain 0");
            contains_error = true;
        }
        let documents_per_case = sweep
            .documents_per_case
            .iter()
            .copied()
            .sorted()
            .dedup()
            .collect_vec();
        if documents_per_case != sweep.documents_per_case {
            warn!("sweep.documents_per_case contains duplicates or is unsorted, using {documents_per_case:?}");
            sweep.documents_per_case = documents_per_case;
        }

        if sweep.data_models.is_empty() {
            error!("sweep.data_models is empty, select at least one of {:?}", DataModel::ALL);
            contains_error = true;
        }
        if sweep.data_models.iter().duplicates().next().is_some() {
            warn!("sweep.data_models lists a model more than once, running it once per group");
            sweep.data_models = sweep.data_models.iter().copied().unique().collect();
        }

        if sweep.runs == 0 {
            error!("sweep.runs cannot be 0");
            contains_error = true;
        }

        if self.database.pool_size == 0 {
            error!("database.pool_size cannot be 0");
            contains_error = true;
        }

        if self.limits.insert_workers == 0 {
            error!("limits.insert_workers cannot be 0");
            contains_error = true;
        } else if self.limits.insert_workers >= self.database.pool_size as usize {
            error!(
                "limits.insert_workers ({}) must stay below database.pool_size ({}), loading concurrency is bounded by the pool even though only one connection executes the encoded batches",
                self.limits.insert_workers, self.database.pool_size
            );
            contains_error = true;
        }

        if self.limits.parameter_limit < WIDEST_ROW {
            error!(
                "limits.parameter_limit ({}) cannot bind a single row of the widest variant ({WIDEST_ROW})",
                self.limits.parameter_limit
            );
            contains_error = true;
        }

        if self.timeouts.query_ms == 0 {
            warn!("timeouts.query_ms is 0, every query will time out");
        }

        contains_error
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("tagbench.db")
}

fn default_pool_size() -> u32 {
    20
}

fn default_illness_cases() -> Vec<usize> {
    vec![1_000, 10_000, 100_000, 1_000_000, 10_000_000]
}

fn default_documents_per_case() -> Vec<usize> {
    vec![5, 20, 50, 100]
}

fn default_data_models() -> Vec<DataModel> {
    DataModel::ALL.to_vec()
}

fn default_runs() -> usize {
    3
}

fn default_parameter_limit() -> usize {
    65_534
}

fn default_large_dataset_threshold() -> usize {
    10_000_000
}

fn default_insert_workers() -> usize {
    4
}

fn default_query_ms() -> u64 {
    20_000
}

fn default_results_path() -> PathBuf {
    PathBuf::from("benchmark_results.csv")
}

fn default_averages_path() -> PathBuf {
    PathBuf::from("benchmark_averages.csv")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_reference_sweep() {
        let mut config = BenchConfig::parse("").unwrap();

        assert!(!config.preflight_checks());
        assert_eq!(config.sweep.illness_cases.len(), 5);
        assert_eq!(config.sweep.documents_per_case, vec![5, 20, 50, 100]);
        assert_eq!(config.sweep.data_models.len(), 6);
        assert_eq!(config.sweep.runs, 3);
        assert_eq!(config.limits.parameter_limit, 65_534);
        assert_eq!(config.timeouts.deadline(Query::Query2), Duration::from_secs(20));
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config = BenchConfig::parse(
            "db:
  path: /tmp/bench.db
sweep:
  illness_cases: [10]
  data_models: [jsonb_indexed]
timeouts:
  query3_ms: 1
",
        )
        .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/tmp/bench.db"));
        assert_eq!(config.database.pool_size, 20);
        assert_eq!(config.sweep.data_models, vec![DataModel::JsonbIndexed]);
        assert_eq!(config.timeouts.deadline(Query::Query1), Duration::from_secs(20));
        assert_eq!(config.timeouts.deadline(Query::Query3), Duration::from_millis(1));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(matches!(
            BenchConfig::parse("sweep:\n  trials: 3\n"),
            Err(ConfigErrors::InvalidYaml(_))
        ));
    }

    #[test]
    fn preflight_sorts_case_counts() {
        let mut config = BenchConfig::default();
        config.sweep.illness_cases = vec![1_000, 10, 1_000, 100];

        assert!(!config.preflight_checks());
        assert_eq!(config.sweep.illness_cases, vec![10, 100, 1_000]);
    }

    #[test]
    fn insert_workers_stay_below_pool_size() {
        let mut config = BenchConfig::default();
        config.database.pool_size = 4;
        config.limits.insert_workers = 3;
        assert!(!config.preflight_checks());

        config.limits.insert_workers = 4;
        assert!(config.preflight_checks());
    }

    #[test]
    fn preflight_collects_all_errors() {
        let mut config = BenchConfig::default();
        config.sweep.runs = 0;
        config.sweep.data_models.clear();
        config.limits.insert_workers = 20;
        config.limits.parameter_limit = 10;

        assert!(config.preflight_checks());
    }
}
