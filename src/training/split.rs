//! Seeded train/test splitting for tabular data

use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Row indices of a train/test split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `0..n` with a seed and hold out `ceil(n * test_size)` rows for testing
pub fn train_test_split(n: usize, test_size: f64, seed: u64) -> SplitIndices {
    let n_test = ((n as f64 * test_size).ceil() as usize).min(n);

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    log::info!("Split {} rows: train={}, test={}", n, train.len(), indices.len());

    SplitIndices {
        train,
        test: indices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sizes() {
        let split = train_test_split(10, 0.2, 42);
        assert_eq!(split.test.len(), 2);
        assert_eq!(split.train.len(), 8);

        // ceil: 11 * 0.2 = 2.2 -> 3
        let split = train_test_split(11, 0.2, 42);
        assert_eq!(split.test.len(), 3);
        assert_eq!(split.train.len(), 8);
    }

    #[test]
    fn test_split_partitions_all_rows() {
        let split = train_test_split(50, 0.2, 1);
        let mut all: Vec<usize> = split.train.iter().chain(split.test.iter()).copied().collect();
        all.sort();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_seeded() {
        assert_eq!(train_test_split(30, 0.2, 42), train_test_split(30, 0.2, 42));
        assert_ne!(train_test_split(30, 0.2, 42), train_test_split(30, 0.2, 43));
    }

    #[test]
    fn test_split_edge_cases() {
        let split = train_test_split(0, 0.2, 42);
        assert!(split.train.is_empty() && split.test.is_empty());

        let split = train_test_split(3, 1.0, 42);
        assert_eq!(split.test.len(), 3);
        assert!(split.train.is_empty());
    }
}
