//! Length bucketing.

/// Equal-width bucket boundaries spanning `[min_length, max_length]`.
///
/// With `num_buckets >= 2`, boundary `i` sits at
/// `min + i * (max - min) / (num_buckets - 1)`, so the last one is exactly
/// `max_length`. A single bucket gets the single boundary `max_length`, which
/// places every length in bucket 0.
pub fn bucket_boundaries(min_length: usize, max_length: usize, num_buckets: usize) -> Vec<f64> {
    let min = min_length as f64;
    let max = max_length as f64;
    match num_buckets {
        0 => Vec::new(),
        1 => vec![max],
        n => {
            let steps = (n - 1) as f64;
            (0..n)
                .map(|i| min + (max - min) * i as f64 / steps)
                .collect()
        }
    }
}

/// Index of the smallest boundary `>= length`, or `boundaries.len()` when the
/// length is above every boundary.
pub fn bucketize(length: usize, boundaries: &[f64]) -> usize {
    let length = length as f64;
    boundaries.partition_point(|&b| b < length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries_are_linspace() {
        assert_eq!(bucket_boundaries(0, 100, 5), vec![0.0, 25.0, 50.0, 75.0, 100.0]);
        assert_eq!(bucket_boundaries(10, 20, 2), vec![10.0, 20.0]);
    }

    #[test]
    fn test_last_boundary_is_exact_max() {
        let boundaries = bucket_boundaries(3, 701, 50);
        assert_eq!(boundaries.len(), 50);
        assert_eq!(boundaries[0], 3.0);
        assert_eq!(boundaries[49], 701.0);
    }

    #[test]
    fn test_single_bucket() {
        let boundaries = bucket_boundaries(5, 50, 1);
        for length in [5, 10, 40, 50] {
            assert_eq!(bucketize(length, &boundaries), 0);
        }
    }

    #[test]
    fn test_bucketize_right_closed_intervals() {
        let boundaries = [0.0, 25.0, 50.0, 75.0, 100.0];
        assert_eq!(bucketize(0, &boundaries), 0);
        assert_eq!(bucketize(1, &boundaries), 1);
        assert_eq!(bucketize(25, &boundaries), 1);
        assert_eq!(bucketize(26, &boundaries), 2);
        assert_eq!(bucketize(100, &boundaries), 4);
        assert_eq!(bucketize(101, &boundaries), 5);
    }

    #[test]
    fn test_degenerate_range() {
        let boundaries = bucket_boundaries(7, 7, 10);
        assert!(boundaries.iter().all(|&b| b == 7.0));
        assert_eq!(bucketize(7, &boundaries), 0);
    }
}
