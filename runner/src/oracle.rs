//! Expected query cardinalities derived straight from the in-memory dataset, and the
//! comparison of what a storage variant actually returned against them.

use crate::{
    database::Query,
    dataset::{documents, total_documents, IllnessCase},
};
use itertools::Itertools;
use rand::{seq::SliceRandom, Rng};
use std::{fmt, sync::Arc};
use tagbench_analysis::DataModel;
use thiserror::Error;

/// row cap of the ordered query
pub const QUERY3_LIMIT: usize = 100;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("Cannot derive expected counts from an empty dataset")]
    EmptyDataset,
}

/// Sampled query arguments and the counts every variant must return for them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Oracle {
    pub sample_first_name: Arc<str>,
    pub sample_illness_case_id: Arc<str>,
    pub expected_query1_count: usize,
    pub expected_query2_count: usize,
    pub expected_query3_count: usize,
}

impl Oracle {
    /// Sample one case at random and count, across all documents, those sharing its
    /// first name and those belonging to it.
    pub fn compute<R: Rng + ?Sized>(cases: &[IllnessCase], rng: &mut R) -> Result<Self, OracleError> {
        let total = total_documents(cases);
        let sample = cases
            .iter()
            .filter(|case| !case.documents.is_empty())
            .collect_vec()
            .choose(rng)
            .copied()
            .ok_or(OracleError::EmptyDataset)?;

        let expected_query1_count = documents(cases)
            .filter(|document| document.first_name == sample.first_name)
            .count();
        let expected_query2_count = documents(cases)
            .filter(|document| document.illness_case_id == sample.illness_case_id)
            .count();

        Ok(Self {
            sample_first_name: sample.first_name.clone(),
            sample_illness_case_id: sample.illness_case_id.clone(),
            expected_query1_count,
            expected_query2_count,
            expected_query3_count: total.min(QUERY3_LIMIT),
        })
    }

    pub fn expected(&self, query: Query) -> usize {
        match query {
            Query::Query1 => self.expected_query1_count,
            Query::Query2 => self.expected_query2_count,
            Query::Query3 => self.expected_query3_count,
        }
    }

    /// Compare returned result-set sizes, collecting every disagreeing query.
    pub fn verify(&self, data_model: DataModel, counts: &QueryCounts) -> Result<(), VerificationError> {
        let mismatches = Query::ALL
            .into_iter()
            .filter_map(|query| {
                let expected = self.expected(query);
                let actual = counts.get(query);

                (expected != actual).then_some(Mismatch {
                    query,
                    expected,
                    actual,
                })
            })
            .collect_vec();

        if mismatches.is_empty() {
            Ok(())
        } else {
            Err(VerificationError {
                data_model,
                mismatches,
            })
        }
    }
}

/// Result-set sizes one variant returned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryCounts {
    pub query1: usize,
    pub query2: usize,
    pub query3: usize,
}

impl QueryCounts {
    pub fn get(&self, query: Query) -> usize {
        match query {
            Query::Query1 => self.query1,
            Query::Query2 => self.query2,
            Query::Query3 => self.query3,
        }
    }

    pub fn set(&mut self, query: Query, count: usize) {
        match query {
            Query::Query1 => self.query1 = count,
            Query::Query2 => self.query2 = count,
            Query::Query3 => self.query3 = count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    pub query: Query,
    pub expected: usize,
    pub actual: usize,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, got {}",
            self.query, self.expected, self.actual
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Verification failed for {data_model}: {}", .mismatches.iter().join(", "))]
pub struct VerificationError {
    pub data_model: DataModel,
    pub mismatches: Vec<Mismatch>,
}

impl VerificationError {
    pub fn queries(&self) -> impl Iterator<Item = Query> + '_ {
        self.mismatches.iter().map(|mismatch| mismatch.query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::Generator;
    use rand::{rngs::StdRng, SeedableRng};

    fn oracle_for(cases: &[IllnessCase]) -> Oracle {
        Oracle::compute(cases, &mut StdRng::seed_from_u64(7)).unwrap()
    }

    #[test]
    fn counts_follow_sampled_case() {
        let cases = Generator::new(Some(1)).generate(50, 5);
        let oracle = oracle_for(&cases);

        let case = cases
            .iter()
            .find(|case| case.illness_case_id == oracle.sample_illness_case_id)
            .unwrap();
        assert_eq!(case.first_name, oracle.sample_first_name);
        assert_eq!(oracle.expected_query2_count, case.documents.len());
        assert!(oracle.expected_query1_count >= oracle.expected_query2_count);
        assert_eq!(oracle.expected_query3_count, QUERY3_LIMIT.min(total_documents(&cases)));
    }

    #[test]
    fn small_datasets_cap_query3_at_total() {
        let cases = Generator::new(Some(2)).generate(3, 5);
        let oracle = oracle_for(&cases);

        assert!(total_documents(&cases) < QUERY3_LIMIT);
        assert_eq!(oracle.expected_query3_count, total_documents(&cases));
    }

    #[test]
    fn empty_dataset_is_rejected() {
        assert_eq!(
            Oracle::compute(&[], &mut StdRng::seed_from_u64(0)),
            Err(OracleError::EmptyDataset)
        );
    }

    #[test]
    fn verify_names_every_mismatch() {
        let oracle = Oracle {
            sample_first_name: Arc::from("Ada"),
            sample_illness_case_id: Arc::from("c-1"),
            expected_query1_count: 4,
            expected_query2_count: 2,
            expected_query3_count: 10,
        };
        let counts = QueryCounts {
            query1: 4,
            query2: 3,
            query3: 9,
        };

        assert!(oracle
            .verify(
                DataModel::Jsonb,
                &QueryCounts {
                    query1: 4,
                    query2: 2,
                    query3: 10
                }
            )
            .is_ok());

        let error = oracle.verify(DataModel::Jsonb, &counts).unwrap_err();
        assert_eq!(error.queries().collect_vec(), vec![Query::Query2, Query::Query3]);
        assert_eq!(
            error.to_string(),
            "Verification failed for jsonb: Query 2: expected 2, got 3, Query 3: expected 10, got 9"
        );
    }
}
