use crate::model::{BenchmarkConfig, DataModel};
use serde::{Deserialize, Serialize};

/// Measurements of a single successful trial, one row of the raw results file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialResult {
    pub illness_cases: usize,
    pub documents_per_case: usize,
    pub total_documents: usize,
    pub data_model: DataModel,
    pub insert_time_ms: u64,
    pub query1_time_ms: u64,
    pub query2_time_ms: u64,
    pub query3_time_ms: u64,
    /// 1-based trial index
    pub run: usize,
    pub timestamp: String,
}

impl TrialResult {
    pub fn config(&self) -> BenchmarkConfig {
        BenchmarkConfig::new(self.illness_cases, self.documents_per_case, self.data_model)
    }
}

/// Per-configuration averages over all trials recorded so far
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageRecord {
    pub illness_cases: usize,
    pub documents_per_case: usize,
    pub total_documents: usize,
    pub data_model: DataModel,
    pub avg_insert_time_ms: u64,
    pub avg_query1_time_ms: u64,
    pub avg_query2_time_ms: u64,
    pub avg_query3_time_ms: u64,
    pub num_runs: usize,
    pub timestamp: String,
}

impl AverageRecord {
    pub fn config(&self) -> BenchmarkConfig {
        BenchmarkConfig::new(self.illness_cases, self.documents_per_case, self.data_model)
    }
}
