use crate::{
    config::TimeoutConfig,
    database::{ConnectionError, Query, SchemaVariant, Store},
    dataset::{total_documents, IllnessCase},
    oracle::{Oracle, QueryCounts, VerificationError},
    timeout::{Raced, TimeoutGuard},
};
use chrono::{SecondsFormat, Utc};
use std::time::{Duration, Instant};
use tagbench_analysis::{BenchmarkConfig, TrialResult};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

#[derive(Error, Debug)]
pub enum TrialError {
    #[error("{query} timed out after {} ms", .elapsed.as_millis())]
    QueryTimeout { query: Query, elapsed: Duration },
    #[error(transparent)]
    VerificationMismatch(#[from] VerificationError),
    #[error("Storage operation failed: {0}")]
    StorageOperationFailure(ConnectionError),
    #[error("Insert of {rows} rows x {columns} columns would exceed the bound-parameter limit of {limit}")]
    ParameterLimitExceeded {
        rows: usize,
        columns: usize,
        limit: usize,
    },
}

impl From<ConnectionError> for TrialError {
    fn from(error: ConnectionError) -> Self {
        match error {
            ConnectionError::ParameterLimitExceeded {
                rows,
                columns,
                limit,
            } => Self::ParameterLimitExceeded {
                rows,
                columns,
                limit,
            },
            error => Self::StorageOperationFailure(error),
        }
    }
}

impl TrialError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::QueryTimeout { .. })
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Runs the lifecycle of one variant over one dataset: setup, insert, the three timed
/// queries and verification, followed by cleanup whatever the outcome.
#[derive(Debug, Clone)]
pub struct TrialRunner {
    store: Store,
    guard: TimeoutGuard,
    timeouts: TimeoutConfig,
}

impl TrialRunner {
    pub fn new(store: Store, timeouts: TimeoutConfig) -> Self {
        Self {
            store,
            guard: TimeoutGuard::new(timeouts.cancel_on_timeout),
            timeouts,
        }
    }

    #[instrument(skip_all, fields(config = %config, run = run))]
    pub fn run(
        &self,
        config: BenchmarkConfig,
        run: usize,
        cases: &[IllnessCase],
        oracle: &Oracle,
    ) -> Result<TrialResult, TrialError> {
        let variant = SchemaVariant::from(config.data_model);
        let outcome = self.measure(variant, config, run, cases, oracle);
        let cleanup = self
            .store
            .connection()
            .and_then(|connection| variant.cleanup(&connection));

        match (outcome, cleanup) {
            (Ok(result), Ok(())) => {
                info!("Cleanup completed");
                Ok(result)
            }
            (Ok(_), Err(e)) => {
                error!("Cleanup failed: {e}");
                Err(e.into())
            }
            (Err(e), Ok(())) => {
                info!("Cleanup completed");
                Err(e)
            }
            (Err(e), Err(cleanup)) => {
                warn!("Ignoring cleanup failure after failed trial: {cleanup}");
                Err(e)
            }
        }
    }

    fn measure(
        &self,
        variant: SchemaVariant,
        config: BenchmarkConfig,
        run: usize,
        cases: &[IllnessCase],
        oracle: &Oracle,
    ) -> Result<TrialResult, TrialError> {
        let start = Instant::now();
        variant.setup_schema(&*self.store.connection()?)?;
        info!("Schema setup completed in {} ms", millis(start.elapsed()));

        let total = total_documents(cases);
        let start = Instant::now();
        variant.bulk_insert(&self.store, cases)?;
        let insert_time = millis(start.elapsed());
        info!(documents = total, "Insert completed in {insert_time} ms");

        let mut counts = QueryCounts::default();
        let mut times = [0; 3];
        for (query, time) in Query::ALL.into_iter().zip(times.iter_mut()) {
            let (count, elapsed) = self.timed_query(variant, query, oracle)?;
            counts.set(query, count);
            *time = elapsed;
        }

        oracle.verify(config.data_model, &counts)?;
        info!("Verification passed");

        Ok(TrialResult {
            illness_cases: config.illness_cases,
            documents_per_case: config.documents_per_case,
            total_documents: total,
            data_model: config.data_model,
            insert_time_ms: insert_time,
            query1_time_ms: times[0],
            query2_time_ms: times[1],
            query3_time_ms: times[2],
            run,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }

    /// race one query against its deadline, returning the row count and elapsed millis
    fn timed_query(
        &self,
        variant: SchemaVariant,
        query: Query,
        oracle: &Oracle,
    ) -> Result<(usize, u64), TrialError> {
        let deadline = self.timeouts.deadline(query);
        let first_name = oracle.sample_first_name.clone();
        let illness_case_id = oracle.sample_illness_case_id.clone();

        let start = Instant::now();
        let raced = self.guard.race(self.store.pool(), deadline, move |connection| match query {
            Query::Query1 => variant.query1(connection, &first_name),
            Query::Query2 => variant.query2(connection, &illness_case_id),
            Query::Query3 => variant.query3(connection),
        })?;
        let elapsed = start.elapsed();

        match raced {
            Raced::Completed(ids) => {
                info!(
                    "{query} ({}) completed in {} ms, found {} documents",
                    query.description(),
                    millis(elapsed),
                    ids.len()
                );
                Ok((ids.len(), millis(elapsed)))
            }
            Raced::TimedOut => {
                warn!("{query} timed out after {} ms", millis(deadline));
                Err(TrialError::QueryTimeout { query, elapsed })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::Mismatch;
    use tagbench_analysis::DataModel;

    #[test]
    fn planner_errors_keep_their_own_kind() {
        let error = TrialError::from(ConnectionError::ParameterLimitExceeded {
            rows: 2_000,
            columns: 60,
            limit: 65_534,
        });
        assert!(matches!(
            error,
            TrialError::ParameterLimitExceeded { rows: 2_000, .. }
        ));
        assert!(matches!(
            TrialError::from(ConnectionError::Disconnected),
            TrialError::StorageOperationFailure(ConnectionError::Disconnected)
        ));
    }

    #[test]
    fn only_timeouts_count_as_timeouts() {
        let timeout = TrialError::QueryTimeout {
            query: Query::Query3,
            elapsed: Duration::from_millis(1_500),
        };
        let mismatch = TrialError::from(VerificationError {
            data_model: DataModel::SeparateColumns,
            mismatches: vec![Mismatch {
                query: Query::Query1,
                expected: 3,
                actual: 0,
            }],
        });

        assert!(timeout.is_timeout());
        assert_eq!(timeout.to_string(), "Query 3 timed out after 1500 ms");
        assert!(!mismatch.is_timeout());
        assert_eq!(
            mismatch.to_string(),
            "Verification failed for separate_columns: Query 1: expected 3, got 0"
        );
    }
}
