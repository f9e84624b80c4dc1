//! Drives the configuration matrix. Groups are swept documents-per-case first and then
//! by ascending case count, so the cascade always sees the smaller sizes of a shape
//! before the larger ones.

use crate::{
    config::{BenchConfig, SweepConfig},
    database::Store,
    dataset::IllnessCase,
    generator::Generator,
    oracle::Oracle,
    skip::SkipSet,
    trial::{TrialError, TrialRunner},
};
use itertools::{iproduct, Itertools};
use tagbench_analysis::{AnalysisError, Aggregator, BenchmarkConfig, TrialResult};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Failed to persist results: {0}")]
    Persist(#[from] AnalysisError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    pub successful: usize,
    pub skipped: usize,
}

#[derive(Debug)]
pub enum TrialOutcome {
    Succeeded(TrialResult),
    TimedOut(TrialError),
    Failed(TrialError),
}

impl TrialOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

#[derive(Debug)]
pub struct Sweep {
    sweep: SweepConfig,
    runner: TrialRunner,
    generator: Generator,
    skipped: SkipSet,
    aggregator: Aggregator,
}

impl Sweep {
    pub fn new(config: &BenchConfig, store: Store) -> Self {
        Self {
            sweep: config.sweep.clone(),
            runner: TrialRunner::new(store, config.timeouts.clone()),
            generator: Generator::new(config.sweep.seed),
            skipped: SkipSet::new(),
            aggregator: Aggregator::new(
                config.output.results.clone(),
                config.output.averages.clone(),
            ),
        }
    }

    pub fn skip_set(&self) -> &SkipSet {
        &self.skipped
    }

    pub fn results(&self) -> &[TrialResult] {
        self.aggregator.results()
    }

    #[instrument(skip_all)]
    pub fn run(&mut self) -> Result<SweepSummary, SweepError> {
        let groups = iproduct!(
            self.sweep.documents_per_case.clone(),
            self.sweep.illness_cases.clone()
        )
        .collect_vec();
        info!(
            groups = groups.len(),
            data_models = self.sweep.data_models.len(),
            runs = self.sweep.runs,
            "Starting benchmark sweep"
        );

        for (documents_per_case, illness_cases) in groups {
            self.run_group(illness_cases, documents_per_case)?;
        }

        let summary = SweepSummary {
            successful: self.aggregator.results().len(),
            skipped: self.skipped.len(),
        };
        info!(
            "Benchmark completed: {} successful runs, {} skipped configurations",
            summary.successful, summary.skipped
        );
        for config in &self.skipped {
            info!("Skipped {config}");
        }

        Ok(summary)
    }

    /// Run every repetition of one (case count, documents-per-case) group across the
    /// variants the cascade has not ruled out. Each repetition gets a fresh dataset.
    #[instrument(skip(self))]
    pub fn run_group(&mut self, illness_cases: usize, documents_per_case: usize) -> Result<(), SweepError> {
        let mut pending = Vec::with_capacity(self.sweep.data_models.len());
        for &model in &self.sweep.data_models {
            let config = BenchmarkConfig::new(illness_cases, documents_per_case, model);
            match self.skipped.cascade_source(&config, &self.sweep.illness_cases) {
                Some(source) if source == config.illness_cases => {
                    info!("Skipping {config}, it already failed");
                }
                Some(source) => {
                    info!("Skipping {config}, {source} cases already timed out or failed");
                    self.skipped.insert(config);
                }
                None => pending.push(config),
            }
        }

        if pending.is_empty() {
            return Ok(());
        }

        for run in 1..=self.sweep.runs {
            info!("Generating {illness_cases} illness cases, {documents_per_case} documents per case (run {run})");
            let cases = self.generator.generate(illness_cases, documents_per_case);
            let oracle = match Oracle::compute(&cases, self.generator.rng()) {
                Ok(oracle) => oracle,
                Err(e) => {
                    error!("Cannot benchmark group: {e}");
                    for config in pending {
                        self.skipped.insert(config);
                    }
                    return Ok(());
                }
            };
            info!(
                first_name = %oracle.sample_first_name,
                illness_case_id = %oracle.sample_illness_case_id,
                "Expected counts: {} / {} / {}",
                oracle.expected_query1_count,
                oracle.expected_query2_count,
                oracle.expected_query3_count
            );

            for &config in &pending {
                if self.skipped.contains(&config) {
                    continue;
                }
                self.execute_trial(config, run, &cases, &oracle)?;
            }
        }

        Ok(())
    }

    /// Run one trial and fold its outcome into the sweep state: successes are persisted,
    /// every failure enters the skip set.
    pub fn execute_trial(
        &mut self,
        config: BenchmarkConfig,
        run: usize,
        cases: &[IllnessCase],
        oracle: &Oracle,
    ) -> Result<TrialOutcome, SweepError> {
        info!("Running {config} (run {run}/{})", self.sweep.runs);

        match self.runner.run(config, run, cases, oracle) {
            Ok(result) => {
                self.aggregator.push(result.clone())?;
                Ok(TrialOutcome::Succeeded(result))
            }
            Err(e) if e.is_timeout() => {
                warn!("{e}, skipping {config} and every larger case count of this shape");
                self.skipped.insert(config);
                Ok(TrialOutcome::TimedOut(e))
            }
            Err(e) => {
                error!("Error with {config}: {e}");
                self.skipped.insert(config);
                Ok(TrialOutcome::Failed(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagbench_analysis::DataModel;
    use tempfile::TempDir;

    fn sweep(dir: &TempDir) -> Sweep {
        let mut config = BenchConfig::default();
        config.database.path = dir.path().join("bench.db");
        config.database.pool_size = 4;
        config.limits.insert_workers = 1;
        config.output.results = dir.path().join("results.csv");
        config.output.averages = dir.path().join("averages.csv");
        config.sweep.illness_cases = vec![10, 20];
        config.sweep.documents_per_case = vec![5];
        config.sweep.data_models = vec![DataModel::Jsonb, DataModel::SeparateColumns];
        config.sweep.runs = 1;
        config.sweep.seed = Some(23);

        let store = Store::load(&config.database, &config.limits).unwrap();
        Sweep::new(&config, store)
    }

    #[test]
    fn cascaded_configurations_are_recorded_without_running() {
        let dir = TempDir::new().unwrap();
        let mut sweep = sweep(&dir);
        sweep
            .skipped
            .insert(BenchmarkConfig::new(10, 5, DataModel::Jsonb));

        sweep.run_group(20, 5).unwrap();

        assert!(sweep
            .skip_set()
            .contains(&BenchmarkConfig::new(20, 5, DataModel::Jsonb)));
        assert_eq!(sweep.skip_set().len(), 2);
        assert_eq!(
            sweep.results().iter().map(|result| result.config()).collect_vec(),
            vec![BenchmarkConfig::new(20, 5, DataModel::SeparateColumns)]
        );
    }
}
