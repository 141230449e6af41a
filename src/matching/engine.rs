use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::types::BucketId;
use crate::index::matrix::{set_columns, BitSlicedIndex};
use crate::sketch::bloom::MembershipFilter;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EngineError {
    #[error("Query filter has {query} positions but the index was built with Bloom filter size {index}")]
    FilterSizeMismatch { query: usize, index: usize },
}

/// Per-bucket hit counts over the rows a query selects
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainmentCounts {
    /// Column Hamming weight; buckets with weight zero are absent
    pub weights: BTreeMap<BucketId, usize>,
    /// Number of set bits in the query filter
    pub selected_rows: usize,
}

impl ContainmentCounts {
    /// Fraction of the query's Bloom bits present in `bucket`
    #[must_use]
    pub fn containment(&self, bucket: BucketId) -> f64 {
        match self.weights.get(&bucket) {
            Some(&weight) if self.selected_rows > 0 => ratio(weight, self.selected_rows),
            _ => 0.0,
        }
    }
}

#[inline]
fn ratio(numerator: usize, denominator: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    {
        numerator as f64 / denominator as f64
    }
}

/// Evaluates query filters against one bit-sliced index
#[derive(Debug, Clone, Copy)]
pub struct QueryEngine<'a> {
    index: &'a BitSlicedIndex,
}

impl<'a> QueryEngine<'a> {
    #[must_use]
    pub fn new(index: &'a BitSlicedIndex) -> Self {
        Self { index }
    }

    fn check_filter(&self, filter: &MembershipFilter) -> Result<(), EngineError> {
        if filter.size() != self.index.num_rows() {
            return Err(EngineError::FilterSizeMismatch {
                query: filter.size(),
                index: self.index.num_rows(),
            });
        }
        Ok(())
    }

    /// Column-wise Hamming weight of the rows selected by `filter`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::FilterSizeMismatch` if the filter was not sized for
    /// this index.
    pub fn containment(&self, filter: &MembershipFilter) -> Result<ContainmentCounts, EngineError> {
        self.check_filter(filter)?;

        let rows = filter.set_positions();
        let mut weights = vec![0usize; self.index.num_cols()];
        for row in self.index.submatrix(&rows) {
            for column in row.set_columns() {
                weights[column] += 1;
            }
        }

        Ok(ContainmentCounts {
            weights: weights
                .into_iter()
                .enumerate()
                .filter(|&(_, weight)| weight > 0)
                .collect(),
            selected_rows: rows.len(),
        })
    }

    /// Buckets whose column is set in every row `filter` selects.
    ///
    /// An empty filter selects no rows and matches nothing.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::FilterSizeMismatch` on a wrongly sized filter.
    pub fn all_present(&self, filter: &MembershipFilter) -> Result<Vec<BucketId>, EngineError> {
        self.check_filter(filter)?;

        let rows = filter.set_positions();
        let mut selected = self.index.submatrix(&rows).into_iter();
        let Some(first) = selected.next() else {
            return Ok(Vec::new());
        };

        let mut acc = first.words().to_vec();
        for row in selected {
            for (a, &w) in acc.iter_mut().zip(row.words()) {
                *a &= w;
            }
            if acc.iter().all(|&w| w == 0) {
                break;
            }
        }

        Ok(set_columns(&acc).collect())
    }

    /// One vote per fragment for every bucket that contains all of it
    ///
    /// # Errors
    ///
    /// Returns `EngineError::FilterSizeMismatch` on a wrongly sized filter.
    pub fn fragment_votes(
        &self,
        filters: &[MembershipFilter],
    ) -> Result<BTreeMap<BucketId, usize>, EngineError> {
        let mut votes = BTreeMap::new();
        for filter in filters {
            for bucket in self.all_present(filter)? {
                *votes.entry(bucket).or_insert(0) += 1;
            }
        }
        Ok(votes)
    }
}
