#![allow(dead_code)]

use rusqlite::Connection;
use tagbench::{config::BenchConfig, database::Store};
use tempfile::TempDir;

/// A configuration writing everything into a fresh temporary directory
pub fn config(dir: &TempDir) -> BenchConfig {
    let mut config = BenchConfig::default();
    config.database.path = dir.path().join("bench.db");
    config.database.pool_size = 6;
    config.limits.insert_workers = 2;
    config.output.results = dir.path().join("benchmark_results.csv");
    config.output.averages = dir.path().join("benchmark_averages.csv");
    config.sweep.seed = Some(42);

    config
}

pub fn store(config: &BenchConfig) -> Store {
    Store::load(&config.database, &config.limits).unwrap()
}

pub fn count(connection: &Connection, table: &str) -> i64 {
    connection
        .query_row(&format!("select count(*) from {table}"), [], |row| row.get(0))
        .unwrap()
}
