use super::config::Thresholds;
use super::report::{ScenarioResult, SystemMetrics};
use super::scalability::ScalabilityAnalysis;

const THROUGHPUT_WEIGHT: f64 = 0.3;
const STABILITY_WEIGHT: f64 = 0.3;
const RESOURCE_WEIGHT: f64 = 0.2;
const SCALABILITY_WEIGHT: f64 = 0.2;

/// Component scores and their weighted total, each within `[0, 100]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadScores {
    pub throughput: f64,
    pub stability: f64,
    pub resource_efficiency: f64,
    pub overall: f64,
}

fn clamp_score(x: f64) -> f64 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 100.0) }
}

pub fn compute_scores(
    scenarios: &[ScenarioResult],
    system: &SystemMetrics,
    scalability: &ScalabilityAnalysis,
    thresholds: &Thresholds,
) -> LoadScores {
    if scenarios.is_empty() {
        return LoadScores::default();
    }
    let n = scenarios.len() as f64;
    let avg_throughput = scenarios.iter().map(|s| s.throughput).sum::<f64>() / n;
    let avg_error_rate = scenarios.iter().map(|s| s.error_rate).sum::<f64>() / n;

    let throughput = clamp_score(avg_throughput / thresholds.min_throughput * 100.0);
    let stability = clamp_score(100.0 - avg_error_rate * 10.0);
    let cpu_headroom = clamp_score(100.0 - system.peak_cpu_usage);
    let memory_headroom = clamp_score(100.0 - system.peak_memory_usage);
    let resource_efficiency = (cpu_headroom + memory_headroom) / 2.0;

    let overall = clamp_score(
        throughput * THROUGHPUT_WEIGHT
            + stability * STABILITY_WEIGHT
            + resource_efficiency * RESOURCE_WEIGHT
            + clamp_score(scalability.linear_scalability) * SCALABILITY_WEIGHT,
    );

    LoadScores {
        throughput,
        stability,
        resource_efficiency,
        overall,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_metrics::ResponseTimeSummary;
    use std::time::Duration;

    fn scenario(throughput: f64, error_rate: f64) -> ScenarioResult {
        ScenarioResult {
            name: "s".into(),
            concurrent_users: 10,
            elapsed: Duration::from_secs(60),
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            throughput,
            error_rate,
            response_times: ResponseTimeSummary::default(),
            user_metrics: Vec::new(),
            time_series: Vec::new(),
            bottlenecks: Vec::new(),
            success: true,
        }
    }

    fn scalability(linear: f64) -> ScalabilityAnalysis {
        ScalabilityAnalysis {
            linear_scalability: linear,
            breaking_point: 0,
            resource_bottlenecks: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    fn system(cpu: f64, memory: f64) -> SystemMetrics {
        SystemMetrics {
            peak_cpu_usage: cpu,
            peak_memory_usage: memory,
            ..SystemMetrics::default()
        }
    }

    #[test]
    fn weighted_overall_score() {
        let s = compute_scores(
            &[scenario(5.0, 2.0)],
            &system(60.0, 40.0),
            &scalability(100.0),
            &Thresholds::default(),
        );
        assert!((s.throughput - 50.0).abs() < 1e-9);
        assert!((s.stability - 80.0).abs() < 1e-9);
        assert!((s.resource_efficiency - 50.0).abs() < 1e-9);
        assert!((s.overall - (15.0 + 24.0 + 10.0 + 20.0)).abs() < 1e-9);
    }

    #[test]
    fn scores_stay_in_bounds() {
        let extremes = [
            (1e9, 0.0, 0.0, 0.0, 1e6),
            (0.0, 100.0, 150.0, 200.0, -50.0),
            (f64::NAN, 50.0, 50.0, 50.0, 50.0),
        ];
        for (tp, err, cpu, mem, linear) in extremes {
            let s = compute_scores(
                &[scenario(tp, err)],
                &system(cpu, mem),
                &scalability(linear),
                &Thresholds::default(),
            );
            for v in [s.throughput, s.stability, s.resource_efficiency, s.overall] {
                assert!((0.0..=100.0).contains(&v), "score out of range: {v}");
            }
        }
    }

    #[test]
    fn no_scenarios_score_zero() {
        let s = compute_scores(&[], &system(0.0, 0.0), &scalability(100.0), &Thresholds::default());
        assert_eq!(s, LoadScores::default());
    }
}
