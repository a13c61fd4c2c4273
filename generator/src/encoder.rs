//! Mixed-radix encoding of all range combinations into the single job array index.
//!
//! Dimension 0 is the least significant digit: it is decoded first using its cardinality as
//! the radix, the quotient is passed on to dimension 1 and so on.

use crate::{
    config::ConfigErrors,
    template::{Dimension, Template, TASK_ID_VARIABLE},
};
use itertools::Itertools;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixedRadix {
    radices: Vec<u64>,
    total: u64,
}

impl MixedRadix {
    pub fn new<I: IntoIterator<Item = usize>>(cardinalities: I) -> Result<Self, ConfigErrors> {
        let radices = cardinalities.into_iter().map(|c| c as u64).collect_vec();
        let mut total: u64 = 1;

        for (dimension, &radix) in radices.iter().enumerate() {
            if radix == 0 {
                return Err(ConfigErrors::ZeroCardinality { dimension });
            }
            total = total
                .checked_mul(radix)
                .ok_or(ConfigErrors::TooManyCombinations)?;
        }

        Ok(Self { radices, total })
    }

    pub fn from_template(template: &Template) -> Result<Self, ConfigErrors> {
        Self::new(template.dimensions.iter().map(Dimension::cardinality))
    }

    /// number of combinations, i.e. the size of the job array
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn radices(&self) -> &[u64] {
        &self.radices
    }

    /// Per dimension indices for a flat job index, `None` if the index is out of range
    pub fn decode(&self, index: u64) -> Option<Vec<u64>> {
        if index >= self.total {
            return None;
        }

        let mut remainder = index;
        Some(
            self.radices
                .iter()
                .map(|&radix| {
                    let quotient = remainder / radix;
                    let digit = remainder - quotient * radix;
                    remainder = quotient;
                    digit
                })
                .collect(),
        )
    }

    /// Bash code doing the same as `decode` on `$SLURM_ARRAY_TASK_ID`.
    ///
    /// Leaves the value of dimension `k` in `v<k>`, looked up from the array `varray<k>`.
    /// Every dimension block is followed by an empty line. Without dimensions there is
    /// nothing to decode and no lines are returned.
    pub fn shell_lines(&self) -> Vec<String> {
        if self.radices.is_empty() {
            return Vec::new();
        }

        let mut lines = vec![format!("r={TASK_ID_VARIABLE}")];
        for (k, radix) in self.radices.iter().enumerate() {
            lines.push(format!("d=$(($r/{radix}))"));
            lines.push(format!("i{k}=$(($r - $d*{radix}))"));
            lines.push("r=$d".to_string());
            lines.push(format!("v{k}=${{varray{k}[${{i{k}}}]}}"));
            lines.push(String::new());
        }

        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::iproduct;
    use std::collections::BTreeSet;

    fn assert_bijection(encoder: &MixedRadix) {
        let decoded = (0..encoder.total())
            .map(|index| encoder.decode(index).unwrap())
            .collect_vec();

        for indices in decoded.iter() {
            assert_eq!(indices.len(), encoder.radices().len());
            for (index, radix) in indices.iter().zip(encoder.radices()) {
                assert!(index < radix, "{indices:?} out of bounds for {:?}", encoder.radices());
            }
        }
        let unique: BTreeSet<_> = decoded.iter().collect();
        assert_eq!(unique.len(), decoded.len());
    }

    #[test]
    fn total_is_the_product() {
        assert_eq!(MixedRadix::new([10]).unwrap().total(), 10);
        assert_eq!(MixedRadix::new([10, 10]).unwrap().total(), 100);
        assert_eq!(MixedRadix::new([2, 3, 5]).unwrap().total(), 30);
    }

    #[test]
    fn decoding_is_a_bijection() {
        for (a, b, c) in iproduct!(1..4usize, 1..5usize, [1usize, 7]) {
            assert_bijection(&MixedRadix::new([a, b, c]).unwrap());
        }
        assert_bijection(&MixedRadix::new([10, 10]).unwrap());
    }

    #[test]
    fn single_dimension() {
        let encoder = MixedRadix::new([10]).unwrap();
        assert_eq!(encoder.decode(7), Some(vec![7]));
    }

    #[test]
    fn first_dimension_is_least_significant() {
        let encoder = MixedRadix::new([10, 10]).unwrap();
        assert_eq!(encoder.decode(0), Some(vec![0, 0]));
        assert_eq!(encoder.decode(99), Some(vec![9, 9]));
        assert_eq!(encoder.decode(23), Some(vec![3, 2]));
        assert_eq!(encoder.decode(100), None);

        let encoder = MixedRadix::new([2, 3]).unwrap();
        assert_eq!(encoder.decode(1), Some(vec![1, 0]));
        assert_eq!(encoder.decode(2), Some(vec![0, 1]));
        assert_eq!(encoder.decode(5), Some(vec![1, 2]));
    }

    #[test]
    fn no_dimensions_is_a_single_combination() {
        let encoder = MixedRadix::new(Vec::<usize>::new()).unwrap();
        assert_eq!(encoder.total(), 1);
        assert_eq!(encoder.decode(0), Some(vec![]));
        assert!(encoder.shell_lines().is_empty());
    }

    #[test]
    fn empty_dimension_is_rejected() {
        assert_eq!(
            MixedRadix::new([3, 0, 2]),
            Err(ConfigErrors::ZeroCardinality { dimension: 1 })
        );
    }

    #[test]
    fn overflow_is_rejected() {
        assert_eq!(
            MixedRadix::new([usize::MAX, usize::MAX, 2]),
            Err(ConfigErrors::TooManyCombinations)
        );
    }

    #[test]
    fn shell_code() {
        let encoder = MixedRadix::new([10, 3]).unwrap();
        assert_eq!(
            encoder.shell_lines(),
            [
                "r=${SLURM_ARRAY_TASK_ID}",
                "d=$(($r/10))",
                "i0=$(($r - $d*10))",
                "r=$d",
                "v0=${varray0[${i0}]}",
                "",
                "d=$(($r/3))",
                "i1=$(($r - $d*3))",
                "r=$d",
                "v1=${varray1[${i1}]}",
                "",
            ]
        );
    }

    #[test]
    fn from_template_ignores_task_id() {
        let template: Template = "./app [0-9] [id] [a,b]".parse().unwrap();
        let encoder = MixedRadix::from_template(&template).unwrap();
        assert_eq!(encoder.radices(), [10, 2]);
        assert_eq!(encoder.total(), 20);
    }
}
