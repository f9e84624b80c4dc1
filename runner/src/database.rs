pub mod batched;
mod jsonb;
mod separate_columns;
mod separate_table;
pub mod sqlite;
pub mod util;

pub use batched::{BatchPlan, Limits, Statement};
pub use sqlite::{Pool, PooledConnection, Store};

use crate::dataset::{documents, total_documents, IllnessCase};
use rusqlite::Connection;
use std::fmt;
use tagbench_analysis::{DataModel, Layout};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("SQLite error: {0}")]
    SQLite(rusqlite::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Failed to encode tag list: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Failed to build insert worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Failed to spawn query thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Query thread exited without reporting a result")]
    Disconnected,
    #[error("Query was cancelled after its deadline elapsed")]
    Cancelled,
    #[error("Statement with {rows} rows x {columns} columns exceeds the bound-parameter limit of {limit}")]
    ParameterLimitExceeded {
        rows: usize,
        columns: usize,
        limit: usize,
    },
}

/// The three timed queries every variant answers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Query {
    /// all documents with a given first name
    Query1,
    /// all documents of a given illness case
    Query2,
    /// first 100 documents ordered by publication time
    Query3,
}

impl Query {
    pub const ALL: [Query; 3] = [Query::Query1, Query::Query2, Query::Query3];

    pub fn number(self) -> usize {
        match self {
            Self::Query1 => 1,
            Self::Query2 => 2,
            Self::Query3 => 3,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Query1 => "search by firstname",
            Self::Query2 => "search by illness_case_id",
            Self::Query3 => "first 100 ordered by published_at",
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Query {}", self.number())
    }
}

/// Lifecycle and query operations of one storage variant, dispatched on its layout.
/// Queries return the matching document ids; query3 returns them in the variant's own
/// ordering (text for the tag layouts, integer epoch milliseconds for the wide layout).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaVariant {
    layout: Layout,
    indexed: bool,
}

impl From<DataModel> for SchemaVariant {
    fn from(model: DataModel) -> Self {
        Self {
            layout: model.layout(),
            indexed: model.indexed(),
        }
    }
}

impl SchemaVariant {
    /// bound parameters one document can expand into within a single statement
    pub fn columns_per_row(&self) -> usize {
        match self.layout {
            Layout::SeparateTable => separate_table::COLUMNS_PER_ROW,
            Layout::Jsonb => jsonb::COLUMNS_PER_ROW,
            Layout::SeparateColumns => separate_columns::COLUMNS_PER_ROW,
        }
    }

    /// drop and recreate every object owned by the variant
    pub fn setup_schema(&self, connection: &Connection) -> Result<(), ConnectionError> {
        self.cleanup(connection)?;

        match self.layout {
            Layout::SeparateTable => separate_table::setup(connection, self.indexed),
            Layout::Jsonb => jsonb::setup(connection, self.indexed),
            Layout::SeparateColumns => separate_columns::setup(connection, self.indexed),
        }
    }

    /// load every document of every case in one transaction
    pub fn bulk_insert(&self, store: &Store, cases: &[IllnessCase]) -> Result<(), ConnectionError> {
        let total = total_documents(cases);
        if total == 0 {
            return Ok(());
        }

        let plan = BatchPlan::new(self.columns_per_row(), total, store.limits())?;
        debug!(
            rows = plan.rows,
            columns = plan.columns,
            limit = plan.limit,
            "Planned insert batches"
        );
        let documents = documents(cases).collect::<Vec<_>>();

        match self.layout {
            Layout::SeparateTable => batched::insert(store, &documents, plan, separate_table::encode),
            Layout::Jsonb => batched::insert(store, &documents, plan, jsonb::encode),
            Layout::SeparateColumns => {
                batched::insert(store, &documents, plan, separate_columns::encode)
            }
        }
    }

    pub fn query1(&self, connection: &Connection, first_name: &str) -> Result<Vec<String>, ConnectionError> {
        match self.layout {
            Layout::SeparateTable => separate_table::query1(connection, first_name),
            Layout::Jsonb => jsonb::query1(connection, self.indexed, first_name),
            Layout::SeparateColumns => separate_columns::query1(connection, first_name),
        }
    }

    pub fn query2(
        &self,
        connection: &Connection,
        illness_case_id: &str,
    ) -> Result<Vec<String>, ConnectionError> {
        match self.layout {
            Layout::SeparateTable => separate_table::query2(connection, illness_case_id),
            Layout::Jsonb => jsonb::query2(connection, self.indexed, illness_case_id),
            Layout::SeparateColumns => separate_columns::query2(connection, illness_case_id),
        }
    }

    pub fn query3(&self, connection: &Connection) -> Result<Vec<String>, ConnectionError> {
        match self.layout {
            Layout::SeparateTable => separate_table::query3(connection),
            Layout::Jsonb => jsonb::query3(connection),
            Layout::SeparateColumns => separate_columns::query3(connection),
        }
    }

    /// drop every object created by `setup_schema`, safe after a partial setup
    pub fn cleanup(&self, connection: &Connection) -> Result<(), ConnectionError> {
        match self.layout {
            Layout::SeparateTable => util::apply_schema(connection, &separate_table::CLEANUP),
            Layout::Jsonb => util::apply_schema(connection, &jsonb::CLEANUP),
            Layout::SeparateColumns => util::apply_schema(connection, &separate_columns::CLEANUP),
        }
    }
}
