use super::{ConnectionError, Limits};
use crate::config::{DatabaseConfig, LimitsConfig};
use r2d2_sqlite::SqliteConnectionManager;
use rayon::{ThreadPool, ThreadPoolBuilder};
use rusqlite::limits::Limit;
use std::{fmt, sync::Arc};
use tracing::{debug, info, warn};

pub type Pool = r2d2::Pool<SqliteConnectionManager>;
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

impl From<rusqlite::Error> for ConnectionError {
    fn from(error: rusqlite::Error) -> Self {
        ConnectionError::SQLite(error)
    }
}

/// applied to every pooled connection when it is opened
const CONNECTION_PRAGMAS: &str = "PRAGMA journal_mode = WAL;
     PRAGMA foreign_keys = ON;
     PRAGMA busy_timeout = 30000;";

/// Shared handle to the benchmark database: a fixed-capacity connection pool, the
/// effective bound-parameter ceiling and the worker pool used for batch encoding
#[derive(Clone)]
pub struct Store {
    pool: Pool,
    limits: Limits,
    workers: Arc<ThreadPool>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("pool_size", &self.pool.max_size())
            .field("limits", &self.limits)
            .field("workers", &self.workers.current_num_threads())
            .finish()
    }
}

impl Store {
    pub fn load(database: &DatabaseConfig, limits: &LimitsConfig) -> Result<Self, ConnectionError> {
        let requested = i32::try_from(limits.parameter_limit).unwrap_or(i32::MAX);
        let manager = SqliteConnectionManager::file(&database.path).with_init(move |connection| {
            connection.execute_batch(CONNECTION_PRAGMAS)?;
            // the engine silently clamps this to its compile-time maximum
            connection.set_limit(Limit::SQLITE_LIMIT_VARIABLE_NUMBER, requested);

            Ok(())
        });

        let pool = r2d2::Pool::builder()
            .max_size(database.pool_size)
            .build(manager)?;

        let engine_limit = pool.get()?.limit(Limit::SQLITE_LIMIT_VARIABLE_NUMBER);
        let parameter_limit = usize::try_from(engine_limit)
            .unwrap_or(0)
            .min(limits.parameter_limit);

        if parameter_limit < limits.parameter_limit {
            warn!(
                configured = limits.parameter_limit,
                engine = engine_limit,
                "SQLite accepts fewer bound parameters than configured, planning batches for {parameter_limit}"
            );
        }

        let workers = ThreadPoolBuilder::new()
            .num_threads(limits.insert_workers)
            .thread_name(|index| format!("tagbench-insert-{index}"))
            .build()?;

        info!(
            path = %database.path.display(),
            pool_size = database.pool_size,
            parameter_limit,
            insert_workers = limits.insert_workers,
            "Opened SQLite store"
        );

        Ok(Self {
            pool,
            limits: Limits {
                parameter_limit,
                large_dataset_threshold: limits.large_dataset_threshold,
            },
            workers: Arc::new(workers),
        })
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn connection(&self) -> Result<PooledConnection, ConnectionError> {
        let connection = self.pool.get()?;
        debug!(idle = self.pool.state().idle_connections, "Checked out connection");

        Ok(connection)
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn workers(&self) -> &ThreadPool {
        &self.workers
    }

    /// names of all user tables currently present, used to confirm cleanup
    pub fn tables(&self) -> Result<Vec<String>, ConnectionError> {
        let connection = self.connection()?;
        let tables = connection
            .prepare_cached(
                "select name from sqlite_master where type = 'table' and name not like 'sqlite_%' order by name",
            )?
            .query_map([], |row| row.get(0))?
            .try_fold(Vec::new(), |mut init, result| {
                init.push(result?);

                Ok::<Vec<String>, ConnectionError>(init)
            })?;

        Ok(tables)
    }
}
