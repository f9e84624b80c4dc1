use super::{util, ConnectionError, Store};
use crate::dataset::Document;
use rusqlite::{params_from_iter, types::Value, DropBehavior};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    mpsc,
};
use tracing::{debug, info};

/// share of the theoretical maximum rows per statement used for regular datasets
pub const STANDARD_FILL_PERCENT: usize = 70;
/// large datasets trade safety margin for fewer round trips
pub const LARGE_FILL_PERCENT: usize = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// bound parameters a single statement may carry
    pub parameter_limit: usize,
    /// total document count from which on `LARGE_FILL_PERCENT` applies
    pub large_dataset_threshold: usize,
}

/// Rows per insert statement for one variant and dataset size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    pub rows: usize,
    pub columns: usize,
    pub limit: usize,
}

impl BatchPlan {
    pub fn new(columns: usize, total_documents: usize, limits: Limits) -> Result<Self, ConnectionError> {
        let max_rows = if columns == 0 {
            0
        } else {
            limits.parameter_limit / columns
        };

        if max_rows == 0 {
            return Err(ConnectionError::ParameterLimitExceeded {
                rows: 1,
                columns,
                limit: limits.parameter_limit,
            });
        }

        let fill = if total_documents >= limits.large_dataset_threshold {
            LARGE_FILL_PERCENT
        } else {
            STANDARD_FILL_PERCENT
        };

        Ok(Self {
            rows: (max_rows * fill / 100).max(1),
            columns,
            limit: limits.parameter_limit,
        })
    }

    /// reject any statement carrying more parameters than the engine accepts
    pub fn check(&self, statement: &Statement) -> Result<(), ConnectionError> {
        if statement.params.len() > self.limit {
            Err(ConnectionError::ParameterLimitExceeded {
                rows: statement.rows,
                columns: statement.columns,
                limit: self.limit,
            })
        } else {
            Ok(())
        }
    }
}

/// A fully encoded multi-row insert
#[derive(Debug, Clone)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
    pub rows: usize,
    pub columns: usize,
}

impl Statement {
    /// `params` holds `columns.len()` values per row, row after row
    pub fn insert(table: &str, columns: &[&str], params: Vec<Value>) -> Self {
        let rows = params.len() / columns.len();

        Self {
            sql: util::insert_sql(table, columns, rows),
            params,
            rows,
            columns: columns.len(),
        }
    }
}

type Encoded = Result<Vec<Statement>, ConnectionError>;

/// Insert all documents inside one transaction. Sub-batches of `plan.rows` documents are
/// encoded concurrently on the store's worker pool and executed by the transaction owner
/// as they arrive; every worker is joined before the commit and any failure rolls the
/// whole load back.
pub fn insert<F>(
    store: &Store,
    documents: &[&Document],
    plan: BatchPlan,
    encode: F,
) -> Result<(), ConnectionError>
where
    F: Fn(&[&Document]) -> Encoded + Sync,
{
    let chunks = documents.chunks(plan.rows).collect::<Vec<_>>();
    let workers = store.workers().current_num_threads().min(chunks.len()).max(1);

    let mut connection = store.connection()?;
    let mut tx = connection.transaction()?;
    tx.set_drop_behavior(DropBehavior::Rollback);

    let next = AtomicUsize::new(0);

    let executed = store.workers().in_place_scope(|scope| -> Result<usize, ConnectionError> {
        let (sender, receiver) = mpsc::sync_channel::<Encoded>(workers);

        for _ in 0..workers {
            let sender = sender.clone();
            let (chunks, next, encode) = (&chunks, &next, &encode);

            scope.spawn(move |_| loop {
                let index = next.fetch_add(1, Ordering::Relaxed);
                let Some(chunk) = chunks.get(index) else {
                    break;
                };

                // the receiver is gone once the transaction owner gave up
                if sender.send(encode(chunk)).is_err() {
                    break;
                }
            });
        }
        drop(sender);

        let mut executed = 0;
        for encoded in receiver {
            for statement in encoded? {
                plan.check(&statement)?;
                tx.prepare_cached(&statement.sql)?
                    .execute(params_from_iter(statement.params.iter()))?;
                executed += 1;
            }
        }

        Ok(executed)
    })?;

    tx.commit()?;

    info!(
        documents = documents.len(),
        batches = chunks.len(),
        statements = executed,
        "Committed bulk insert"
    );
    debug!(workers, rows_per_batch = plan.rows, "Insert worker usage");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const LIMITS: Limits = Limits {
        parameter_limit: 65_534,
        large_dataset_threshold: 10_000_000,
    };

    #[test]
    fn wide_rows_shrink_batches() {
        let narrow = BatchPlan::new(4, 1_000, LIMITS).unwrap();
        let wide = BatchPlan::new(23, 1_000, LIMITS).unwrap();

        assert_eq!(narrow.rows, 16_383 * 70 / 100);
        assert_eq!(wide.rows, 2_849 * 70 / 100);
    }

    #[test]
    fn large_datasets_use_a_smaller_margin() {
        let standard = BatchPlan::new(60, 9_999_999, LIMITS).unwrap();
        let large = BatchPlan::new(60, 10_000_000, LIMITS).unwrap();

        assert!(large.rows > standard.rows);
        assert!(large.rows * large.columns <= LIMITS.parameter_limit);
    }

    #[test]
    fn rows_wider_than_the_limit_are_fatal() {
        let limits = Limits {
            parameter_limit: 10,
            ..LIMITS
        };

        assert!(matches!(
            BatchPlan::new(11, 5, limits),
            Err(ConnectionError::ParameterLimitExceeded { limit: 10, .. })
        ));
        assert!(BatchPlan::new(0, 5, limits).is_err());
        assert_eq!(BatchPlan::new(10, 5, limits).unwrap().rows, 1);
    }

    #[test]
    fn oversized_statements_are_rejected() {
        let plan = BatchPlan::new(3, 10, Limits {
            parameter_limit: 6,
            ..LIMITS
        })
        .unwrap();
        let statement = Statement::insert("documents", &["a", "b", "c"], vec![Value::Null; 9]);

        assert_eq!(statement.rows, 3);
        assert!(matches!(
            plan.check(&statement),
            Err(ConnectionError::ParameterLimitExceeded {
                rows: 3,
                columns: 3,
                limit: 6
            })
        ));
    }

    proptest! {
        #[test]
        fn plans_never_exceed_the_ceiling(
            columns in 1usize..200,
            limit in 200usize..70_000,
            total in 0usize..20_000_000,
        ) {
            let limits = Limits { parameter_limit: limit, large_dataset_threshold: 10_000_000 };
            let plan = BatchPlan::new(columns, total, limits).unwrap();

            prop_assert!(plan.rows >= 1);
            prop_assert!(plan.rows * columns <= limit);
        }
    }
}
