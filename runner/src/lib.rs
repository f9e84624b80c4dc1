//! Benchmark engine comparing storage layouts for tagged documents in SQLite: bulk load
//! and query latency across a sweep of dataset sizes, with and without indexes.

pub mod config;
pub mod database;
pub mod dataset;
pub mod generator;
pub mod oracle;
pub mod skip;
pub mod sweep;
pub mod timeout;
pub mod trial;

pub use tagbench_analysis as analysis;
