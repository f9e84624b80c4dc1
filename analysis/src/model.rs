use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Physical layout of the tag attributes, independent of indexing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Layout {
    /// one `document_tags` row per attribute
    SeparateTable,
    /// one JSON tag list per document
    Jsonb,
    /// one column per attribute
    SeparateColumns,
}

impl Layout {
    pub const ALL: [Layout; 3] = [Layout::SeparateTable, Layout::Jsonb, Layout::SeparateColumns];

    /// identifier of the non-indexed variant
    pub fn as_str(self) -> &'static str {
        self.variant(false).as_str()
    }

    pub fn variant(self, indexed: bool) -> DataModel {
        match (self, indexed) {
            (Self::SeparateTable, false) => DataModel::SeparateTable,
            (Self::SeparateTable, true) => DataModel::SeparateTableIndexed,
            (Self::Jsonb, false) => DataModel::Jsonb,
            (Self::Jsonb, true) => DataModel::JsonbIndexed,
            (Self::SeparateColumns, false) => DataModel::SeparateColumns,
            (Self::SeparateColumns, true) => DataModel::SeparateColumnsIndexed,
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All benchmarked storage variants, i.e., layout x indexed/non-indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataModel {
    SeparateTable,
    SeparateTableIndexed,
    Jsonb,
    JsonbIndexed,
    SeparateColumns,
    SeparateColumnsIndexed,
}

impl DataModel {
    pub const ALL: [DataModel; 6] = [
        DataModel::SeparateTable,
        DataModel::SeparateTableIndexed,
        DataModel::Jsonb,
        DataModel::JsonbIndexed,
        DataModel::SeparateColumns,
        DataModel::SeparateColumnsIndexed,
    ];

    pub fn layout(self) -> Layout {
        match self {
            Self::SeparateTable | Self::SeparateTableIndexed => Layout::SeparateTable,
            Self::Jsonb | Self::JsonbIndexed => Layout::Jsonb,
            Self::SeparateColumns | Self::SeparateColumnsIndexed => Layout::SeparateColumns,
        }
    }

    pub fn indexed(self) -> bool {
        matches!(
            self,
            Self::SeparateTableIndexed | Self::JsonbIndexed | Self::SeparateColumnsIndexed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SeparateTable => "separate_table",
            Self::SeparateTableIndexed => "separate_table_indexed",
            Self::Jsonb => "jsonb",
            Self::JsonbIndexed => "jsonb_indexed",
            Self::SeparateColumns => "separate_columns",
            Self::SeparateColumnsIndexed => "separate_columns_indexed",
        }
    }
}

impl fmt::Display for DataModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown data model: {0}")]
pub struct ParseDataModelError(pub String);

impl FromStr for DataModel {
    type Err = ParseDataModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|model| model.as_str() == s)
            .ok_or_else(|| ParseDataModelError(s.to_owned()))
    }
}

/// One point of the sweep: (case count, documents-per-case target, variant)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    pub illness_cases: usize,
    pub documents_per_case: usize,
    pub data_model: DataModel,
}

impl BenchmarkConfig {
    pub fn new(illness_cases: usize, documents_per_case: usize, data_model: DataModel) -> Self {
        Self {
            illness_cases,
            documents_per_case,
            data_model,
        }
    }

    /// same shape with a different case count
    pub fn with_cases(self, illness_cases: usize) -> Self {
        Self {
            illness_cases,
            ..self
        }
    }
}

impl fmt::Display for BenchmarkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cases, {} docs/case, {}",
            self.illness_cases, self.documents_per_case, self.data_model
        )
    }
}
