use std::time::Duration;

use chrono::{DateTime, Utc};
use gauntlet_metrics::{ResponseTimeSummary, RunningStats};

use super::bottleneck::Bottleneck;
use super::config::{ProfileKind, Thresholds};
use super::scalability::ScalabilityAnalysis;
use super::score::LoadScores;

/// Snapshot taken once per sampling interval during steady state.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesSample {
    pub timestamp: DateTime<Utc>,
    /// Time since the scenario started.
    pub elapsed: Duration,
    pub active_users: usize,
    pub requests_per_second: f64,
    pub average_response_time_ms: f64,
    /// Percent of requests in the window that failed.
    pub error_rate: f64,
    pub cpu_usage: f64,
    pub memory_usage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserMetrics {
    pub user_id: String,
    pub profile: ProfileKind,
    pub total_actions: u64,
    pub successful_actions: u64,
    pub average_response_time_ms: f64,
    pub session_duration: Duration,
    pub errors: Vec<String>,
}

/// Everything one virtual user session produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    pub metrics: UserMetrics,
    /// Response times of successful actions, in milliseconds.
    pub response_times_ms: Vec<f64>,
}

impl SessionOutcome {
    /// Outcome of a session whose task died. The action it was on counts as
    /// one failed request; whatever it measured before is lost.
    pub fn aborted(user_id: String, profile: ProfileKind, reason: String) -> Self {
        Self {
            metrics: UserMetrics {
                user_id,
                profile,
                total_actions: 1,
                successful_actions: 0,
                average_response_time_ms: 0.0,
                session_duration: Duration::ZERO,
                errors: vec![reason],
            },
            response_times_ms: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioResult {
    pub name: String,
    pub concurrent_users: u32,
    pub elapsed: Duration,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Requests per second over the whole scenario.
    pub throughput: f64,
    /// Percent.
    pub error_rate: f64,
    pub response_times: ResponseTimeSummary,
    pub user_metrics: Vec<UserMetrics>,
    pub time_series: Vec<TimeSeriesSample>,
    pub bottlenecks: Vec<Bottleneck>,
    pub success: bool,
}

/// Folds per-session outcomes into a scenario result. Pure: the same inputs
/// always give the same result.
pub fn aggregate_scenario(
    name: &str,
    concurrent_users: u32,
    elapsed: Duration,
    outcomes: Vec<SessionOutcome>,
    time_series: Vec<TimeSeriesSample>,
    bottlenecks: Vec<Bottleneck>,
    thresholds: &Thresholds,
) -> ScenarioResult {
    let mut total_requests = 0u64;
    let mut successful_requests = 0u64;
    let mut response_times = Vec::new();
    let mut user_metrics = Vec::with_capacity(outcomes.len());

    for outcome in outcomes {
        total_requests += outcome.metrics.total_actions;
        successful_requests += outcome.metrics.successful_actions;
        response_times.extend(outcome.response_times_ms);
        user_metrics.push(outcome.metrics);
    }
    let failed_requests = total_requests.saturating_sub(successful_requests);

    let throughput = gauntlet_metrics::per_sec(total_requests, elapsed.as_secs_f64());
    let error_rate = if total_requests == 0 {
        0.0
    } else {
        failed_requests as f64 / total_requests as f64 * 100.0
    };
    let response_times = ResponseTimeSummary::from_samples(&mut response_times);

    let success = error_rate <= thresholds.max_error_rate
        && response_times.average <= thresholds.max_response_time_ms
        && throughput >= thresholds.min_throughput;

    ScenarioResult {
        name: name.to_string(),
        concurrent_users,
        elapsed,
        total_requests,
        successful_requests,
        failed_requests,
        throughput,
        error_rate,
        response_times,
        user_metrics,
        time_series,
        bottlenecks,
        success,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SystemMetrics {
    pub peak_concurrent_users: u32,
    pub peak_throughput: f64,
    pub average_cpu_usage: f64,
    pub peak_cpu_usage: f64,
    pub average_memory_usage: f64,
    pub peak_memory_usage: f64,
}

pub fn system_metrics(scenarios: &[ScenarioResult]) -> SystemMetrics {
    let samples = || scenarios.iter().flat_map(|s| s.time_series.iter());
    let cpu: RunningStats = samples().map(|s| s.cpu_usage).collect();
    let memory: RunningStats = samples().map(|s| s.memory_usage).collect();

    SystemMetrics {
        peak_concurrent_users: scenarios
            .iter()
            .map(|s| s.concurrent_users)
            .max()
            .unwrap_or(0),
        peak_throughput: scenarios.iter().map(|s| s.throughput).fold(0.0, f64::max),
        average_cpu_usage: cpu.mean(),
        peak_cpu_usage: cpu.max(),
        average_memory_usage: memory.mean(),
        peak_memory_usage: memory.max(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadTestReport {
    pub scenarios: Vec<ScenarioResult>,
    pub system_metrics: SystemMetrics,
    pub scalability: ScalabilityAnalysis,
    pub scores: LoadScores,
    /// Every scenario passed, the overall score reached the pass mark and
    /// peak cpu/memory stayed within their limits.
    pub success: bool,
}

impl LoadTestReport {
    pub fn new(scenarios: Vec<ScenarioResult>, thresholds: &Thresholds) -> Self {
        let system_metrics = system_metrics(&scenarios);
        let scalability = super::scalability::analyze_scalability(&scenarios);
        let scores = super::score::compute_scores(&scenarios, &system_metrics, &scalability, thresholds);

        let success = !scenarios.is_empty()
            && scenarios.iter().all(|s| s.success)
            && scores.overall >= thresholds.overall_pass_score
            && system_metrics.peak_cpu_usage <= thresholds.max_cpu_usage
            && system_metrics.peak_memory_usage <= thresholds.max_memory_usage;

        Self {
            scenarios,
            system_metrics,
            scalability,
            scores,
            success,
        }
    }
}
