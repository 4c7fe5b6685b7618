use std::collections::BTreeSet;
use std::fmt;

use itertools::Itertools;
use rand::Rng;
use rand::seq::SliceRandom;

use crate::error::Result;
use crate::model::config::SubsetStrategy;
use crate::model::labeled::{Label, LabeledTensor};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubjectSubset {
    pub subjects: Vec<Label>,
}

impl SubjectSubset {
    pub fn new(mut subjects: Vec<Label>) -> Self {
        subjects.sort();
        Self { subjects }
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    pub fn contains(&self, subject: &Label) -> bool {
        self.subjects.binary_search(subject).is_ok()
    }
}

impl fmt::Display for SubjectSubset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.subjects.iter().join(", "))
    }
}

pub type Selections = Vec<(String, SubjectSubset)>;

pub fn subsample_sizes(n_subjects: usize) -> Vec<usize> {
    (2..=n_subjects).collect()
}

pub fn n_choose_k(n: usize, k: usize) -> u128 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        acc = acc * (n - i) as u128 / (i + 1) as u128;
    }
    acc
}

pub fn subject_subsets<R: Rng + ?Sized>(
    subjects: &[Label],
    k: usize,
    strategy: SubsetStrategy,
    rng: &mut R,
) -> Vec<SubjectSubset> {
    match strategy {
        SubsetStrategy::Random { max_subsets }
            if n_choose_k(subjects.len(), k) > max_subsets as u128 =>
        {
            let mut drawn = BTreeSet::new();
            while drawn.len() < max_subsets {
                let pick = subjects.choose_multiple(rng, k).cloned().collect::<Vec<_>>();
                drawn.insert(SubjectSubset::new(pick));
            }
            drawn.into_iter().collect()
        }
        _ => subjects
            .iter()
            .cloned()
            .combinations(k)
            .map(SubjectSubset::new)
            .collect(),
    }
}

pub fn iterate_subsets<'a, R: Rng + ?Sized>(
    assembly: &'a LabeledTensor,
    subject_coord: &'a str,
    unit_dim: &'a str,
    k: usize,
    strategy: SubsetStrategy,
    rng: &mut R,
) -> Result<impl Iterator<Item = Result<(Selections, LabeledTensor)>> + 'a> {
    let subject_values = assembly.coord_values(subject_coord)?;
    let subjects = crate::model::labeled::unique_sorted(subject_values);
    let subsets = subject_subsets(&subjects, k, strategy, rng);
    Ok(subsets.into_iter().map(move |subset| {
        let mask = subject_values
            .iter()
            .map(|s| subset.contains(s))
            .collect::<Vec<_>>();
        let sub_assembly = assembly.filter(unit_dim, &mask)?;
        Ok((vec![(subject_coord.to_string(), subset)], sub_assembly))
    }))
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage2_subsample.rs"]
mod tests;
