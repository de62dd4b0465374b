use std::collections::BTreeMap;
use std::time::Duration;

use super::UnitResult;

// Reference scale for `resource_efficiency`.
const CPU_SCALE_PERCENT: f64 = 100.0;
const MEMORY_SCALE_MB: f64 = 8192.0;
const NETWORK_SCALE_MBPS: f64 = 100.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OptimizationMetrics {
    /// Share of units (0..=1) that ran alongside at least one other unit.
    pub parallelization_ratio: f64,
    /// Mean utilisation (0..=1) of cpu, memory and network across units.
    pub resource_efficiency: f64,
    /// `1 - wall time / summed unit time`; positive when overlap saved time.
    pub time_optimization: f64,
    /// Time spent on retries by units that still failed.
    pub failure_recovery_time: Duration,
}

pub fn optimization_metrics(
    results: &BTreeMap<String, UnitResult>,
    total_duration: Duration,
) -> OptimizationMetrics {
    if results.is_empty() {
        return OptimizationMetrics::default();
    }
    let n = results.len() as f64;

    let parallel = results
        .values()
        .filter(|r| r.resource_usage.concurrent_units > 1)
        .count();

    let efficiency_sum: f64 = results
        .values()
        .map(|r| {
            let u = &r.resource_usage;
            let cpu = (u.peak_cpu_percent / CPU_SCALE_PERCENT).min(1.0);
            let mem = (u.peak_memory_mb / MEMORY_SCALE_MB).min(1.0);
            let net = (u.network_mbps / NETWORK_SCALE_MBPS).min(1.0);
            (cpu + mem + net) / 3.0
        })
        .sum();

    let sequential: Duration = results.values().map(|r| r.duration).sum();
    let time_optimization = if sequential.is_zero() {
        0.0
    } else {
        1.0 - total_duration.as_secs_f64() / sequential.as_secs_f64()
    };

    let failure_recovery_time = results
        .values()
        .filter(|r| !r.success)
        .map(|r| r.duration * r.retry_count)
        .sum();

    OptimizationMetrics {
        parallelization_ratio: parallel as f64 / n,
        resource_efficiency: efficiency_sum / n,
        time_optimization,
        failure_recovery_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::ResourceUsage;
    use chrono::Utc;

    fn result(success: bool, secs: u64, retries: u32, usage: ResourceUsage) -> UnitResult {
        let now = Utc::now();
        UnitResult {
            success,
            start_time: now,
            end_time: now,
            duration: Duration::from_secs(secs),
            retry_count: retries,
            resource_usage: usage,
            error: (!success).then(|| "failed".to_string()),
        }
    }

    #[test]
    fn computes_all_metrics() {
        let mut results = BTreeMap::new();
        results.insert(
            "a".to_string(),
            result(
                true,
                10,
                0,
                ResourceUsage {
                    peak_cpu_percent: 50.0,
                    peak_memory_mb: 4096.0,
                    network_mbps: 200.0,
                    concurrent_units: 2,
                },
            ),
        );
        results.insert(
            "b".to_string(),
            result(
                false,
                10,
                3,
                ResourceUsage {
                    concurrent_units: 2,
                    ..ResourceUsage::default()
                },
            ),
        );
        results.insert(
            "c".to_string(),
            result(
                true,
                20,
                0,
                ResourceUsage {
                    concurrent_units: 1,
                    ..ResourceUsage::default()
                },
            ),
        );

        let m = optimization_metrics(&results, Duration::from_secs(30));
        assert!((m.parallelization_ratio - 2.0 / 3.0).abs() < 1e-9);
        // a: (0.5 + 0.5 + 1.0) / 3, b and c: 0
        assert!((m.resource_efficiency - (2.0 / 3.0) / 3.0).abs() < 1e-9);
        assert!((m.time_optimization - 0.25).abs() < 1e-9);
        assert_eq!(m.failure_recovery_time, Duration::from_secs(30));
    }

    #[test]
    fn empty_results_yield_defaults() {
        let m = optimization_metrics(&BTreeMap::new(), Duration::from_secs(1));
        assert_eq!(m, OptimizationMetrics::default());
    }
}
