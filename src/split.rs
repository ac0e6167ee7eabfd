//! Seeded, label-stratified train/test splitting.

use crate::error::{ActimateError, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;

/// Example indices on each side of a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split example indices so every class keeps its proportion on both sides.
///
/// Each class sends `round(n_c × (1 − train_fraction))` examples to the test
/// side while keeping at least one for training. The same labels, fraction
/// and seed always produce the same split.
pub fn stratified_split(labels: &[usize], train_fraction: f64, seed: u64) -> Result<Split> {
    if labels.len() < 2 {
        return Err(ActimateError::InsufficientData {
            message: format!("need at least 2 examples to split, found {}", labels.len()),
        });
    }

    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (idx, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(idx);
    }
    if let Some((label, _)) = by_class.iter().find(|(_, members)| members.len() < 2) {
        return Err(ActimateError::InsufficientData {
            message: format!(
                "the least populated class ({}) has only 1 member, which is too few",
                label
            ),
        });
    }

    let test_fraction = 1.0 - train_fraction;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();

    for members in by_class.values_mut() {
        members.shuffle(&mut rng);
        let n_test = ((members.len() as f64 * test_fraction).round() as usize).min(members.len() - 1);
        test.extend_from_slice(&members[..n_test]);
        train.extend_from_slice(&members[n_test..]);
    }

    if test.is_empty() || train.is_empty() {
        return Err(ActimateError::InsufficientData {
            message: format!(
                "split of {} examples leaves {} for training and {} for testing",
                labels.len(),
                train.len(),
                test.len()
            ),
        });
    }

    train.shuffle(&mut rng);
    test.shuffle(&mut rng);
    Ok(Split { train, test })
}

/// Clone the items at `indices`, in index order.
pub fn take<T: Clone>(items: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| items[i].clone()).collect()
}

/// Number of trailing examples held back for validation.
///
/// The split keeps at least one example on each side when `len >= 2`.
pub fn validation_len(len: usize, fraction: f64) -> usize {
    if len < 2 {
        return 0;
    }
    ((len as f64 * fraction).floor() as usize).clamp(1, len - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn labels(counts: &[usize]) -> Vec<usize> {
        counts
            .iter()
            .enumerate()
            .flat_map(|(label, &n)| std::iter::repeat_n(label, n))
            .collect()
    }

    #[test]
    fn split_is_a_partition() {
        let y = labels(&[20, 30, 10, 25, 15]);
        let split = stratified_split(&y, 0.8, 42).unwrap();

        let all: HashSet<usize> = split.train.iter().chain(&split.test).copied().collect();
        assert_eq!(all.len(), y.len());
        assert_eq!(split.train.len() + split.test.len(), y.len());
    }

    #[test]
    fn class_proportions_are_kept() {
        let y = labels(&[20, 30, 10, 25, 15]);
        let split = stratified_split(&y, 0.8, 42).unwrap();

        for (label, expected_test) in [(0, 4), (1, 6), (2, 2), (3, 5), (4, 3)] {
            let in_test = split.test.iter().filter(|&&i| y[i] == label).count();
            assert_eq!(in_test, expected_test, "label {}", label);
        }
    }

    #[test]
    fn same_seed_same_split() {
        let y = labels(&[12, 9, 14]);
        assert_eq!(
            stratified_split(&y, 0.8, 42).unwrap(),
            stratified_split(&y, 0.8, 42).unwrap()
        );
        assert_ne!(
            stratified_split(&y, 0.8, 42).unwrap(),
            stratified_split(&y, 0.8, 7).unwrap()
        );
    }

    #[test]
    fn every_class_keeps_a_training_example() {
        let y = labels(&[2, 2, 3]);
        let split = stratified_split(&y, 0.2, 1).unwrap();
        for label in 0..3 {
            assert!(split.train.iter().any(|&i| y[i] == label));
        }
    }

    #[test]
    fn singleton_class_is_an_error() {
        let y = labels(&[5, 1, 5]);
        let err = stratified_split(&y, 0.8, 42).unwrap_err();
        assert!(err.to_string().contains("only 1 member"), "{}", err);
    }

    #[test]
    fn too_few_examples_is_an_error() {
        assert!(stratified_split(&[0], 0.8, 42).is_err());
        assert!(stratified_split(&[], 0.8, 42).is_err());
    }

    #[test]
    fn tiny_classes_with_empty_test_side_is_an_error() {
        // 2 × 0.1 rounds to 0 test examples per class
        let y = labels(&[2, 2]);
        assert!(matches!(
            stratified_split(&y, 0.9, 42),
            Err(ActimateError::InsufficientData { .. })
        ));
    }

    #[test]
    fn take_follows_index_order() {
        let items = vec!["a", "b", "c", "d"];
        assert_eq!(take(&items, &[3, 0, 2]), vec!["d", "a", "c"]);
    }

    #[test]
    fn validation_tail_length() {
        assert_eq!(validation_len(100, 0.2), 20);
        assert_eq!(validation_len(3, 0.2), 1);
        assert_eq!(validation_len(1, 0.2), 0);
    }
}
