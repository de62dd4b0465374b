use crate::agg::RunningStats;

/// Linear-interpolated percentile over an ascending slice.
///
/// The rank is `(p / 100) * (n - 1)`; the fractional part weights the two
/// bracketing samples. Returns `0.0` for an empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let weight = rank - lower as f64;
            sorted[lower] * (1.0 - weight) + sorted[upper] * weight
        }
    }
}

/// Response-time statistics in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResponseTimeSummary {
    pub count: u64,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

impl ResponseTimeSummary {
    /// Summarizes samples in any order; the input is sorted in place.
    pub fn from_samples(samples: &mut [f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        samples.sort_by(f64::total_cmp);

        let stats: RunningStats = samples.iter().copied().collect();
        Self {
            count: stats.count(),
            average: stats.mean(),
            min: stats.min(),
            max: stats.max(),
            p50: percentile(samples, 50.0),
            p95: percentile(samples, 95.0),
            p99: percentile(samples, 99.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates_between_ranks() {
        let sorted = [10.0, 20.0, 30.0, 40.0];
        // rank = 0.5 * 3 = 1.5
        assert!((percentile(&sorted, 50.0) - 25.0).abs() < 1e-9);
        assert!((percentile(&sorted, 0.0) - 10.0).abs() < 1e-9);
        assert!((percentile(&sorted, 100.0) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn percentile_of_empty_and_single() {
        assert_eq!(percentile(&[], 95.0), 0.0);
        assert_eq!(percentile(&[7.0], 99.0), 7.0);
    }

    #[test]
    fn summary_percentiles_are_monotonic() {
        let mut samples: Vec<f64> = (0..997).map(|i| ((i * 7919) % 1013) as f64).collect();
        let s = ResponseTimeSummary::from_samples(&mut samples);
        assert_eq!(s.count, 997);
        assert!(s.min <= s.p50);
        assert!(s.p50 <= s.p95);
        assert!(s.p95 <= s.p99);
        assert!(s.p99 <= s.max);
    }

    #[test]
    fn summary_of_empty_is_default() {
        let s = ResponseTimeSummary::from_samples(&mut []);
        assert_eq!(s, ResponseTimeSummary::default());
    }
}
