use std::collections::BTreeSet;
use tagbench_analysis::BenchmarkConfig;

/// Configurations known to be infeasible in this sweep. Entries are only ever added.
#[derive(Debug, Clone, Default)]
pub struct SkipSet(BTreeSet<BenchmarkConfig>);

impl SkipSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// returns whether the configuration was newly recorded
    pub fn insert(&mut self, config: BenchmarkConfig) -> bool {
        self.0.insert(config)
    }

    pub fn contains(&self, config: &BenchmarkConfig) -> bool {
        self.0.contains(config)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BenchmarkConfig> + '_ {
        self.0.iter()
    }

    /// The case count whose entry rules out `config`: the configuration itself, or any
    /// smaller case count of `case_counts` with the same documents-per-case and variant.
    pub fn cascade_source(&self, config: &BenchmarkConfig, case_counts: &[usize]) -> Option<usize> {
        if self.contains(config) {
            return Some(config.illness_cases);
        }

        case_counts
            .iter()
            .copied()
            .filter(|&cases| cases < config.illness_cases)
            .find(|&cases| self.contains(&config.with_cases(cases)))
    }
}

impl<'a> IntoIterator for &'a SkipSet {
    type Item = &'a BenchmarkConfig;
    type IntoIter = std::collections::btree_set::Iter<'a, BenchmarkConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tagbench_analysis::DataModel;

    const CASES: [usize; 5] = [1_000, 10_000, 100_000, 1_000_000, 10_000_000];

    #[test]
    fn cascade_only_reaches_larger_sizes() {
        let mut skipped = SkipSet::new();
        assert!(skipped.insert(BenchmarkConfig::new(10_000, 20, DataModel::Jsonb)));
        assert!(!skipped.insert(BenchmarkConfig::new(10_000, 20, DataModel::Jsonb)));

        let config = |cases, docs, model| BenchmarkConfig::new(cases, docs, model);
        assert_eq!(skipped.cascade_source(&config(1_000, 20, DataModel::Jsonb), &CASES), None);
        assert_eq!(
            skipped.cascade_source(&config(10_000, 20, DataModel::Jsonb), &CASES),
            Some(10_000)
        );
        assert_eq!(
            skipped.cascade_source(&config(1_000_000, 20, DataModel::Jsonb), &CASES),
            Some(10_000)
        );
        assert_eq!(skipped.cascade_source(&config(100_000, 5, DataModel::Jsonb), &CASES), None);
        assert_eq!(
            skipped.cascade_source(&config(100_000, 20, DataModel::JsonbIndexed), &CASES),
            None
        );
        assert_eq!(skipped.len(), 1);
    }

    proptest! {
        #[test]
        fn cascade_is_monotonic(failed in 0..CASES.len(), model in 0..DataModel::ALL.len()) {
            let model = DataModel::ALL[model];
            let mut skipped = SkipSet::new();
            skipped.insert(BenchmarkConfig::new(CASES[failed], 50, model));

            for (index, cases) in CASES.into_iter().enumerate() {
                let source = skipped.cascade_source(&BenchmarkConfig::new(cases, 50, model), &CASES);
                prop_assert_eq!(source.is_some(), index >= failed);
            }
        }
    }
}
