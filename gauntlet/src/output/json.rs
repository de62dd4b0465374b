use serde::Serialize;
use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;

use gauntlet_core::load::{LoadTestReport, ScenarioResult};
use gauntlet_core::orchestrator::{ExecutionPhase, ExecutionResult, StrategyKind, UnitDescriptor};

use super::{OutputFormatter, SuiteInfo, SuiteReport};

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _plan_path: &Path, _strategy: StrategyKind, _suites: &[SuiteInfo]) {}

    fn print_plan(
        &self,
        strategy: StrategyKind,
        order: &[Arc<UnitDescriptor>],
        phases: &[ExecutionPhase],
    ) -> anyhow::Result<()> {
        emit_json_line(&build_plan_line(strategy, order, phases))
    }

    fn print_summary(&self, result: &ExecutionResult, suites: &[SuiteReport]) -> anyhow::Result<()> {
        emit_json_line(&build_summary_line(result, suites))
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonPlanLine {
    pub kind: &'static str,
    pub strategy: &'static str,
    pub order: Vec<String>,
    pub phases: Vec<JsonPhase>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonPhase {
    pub id: usize,
    pub units: Vec<String>,
    pub parallel: bool,
    pub forced: bool,
    pub estimated_duration_secs: f64,
}

fn build_plan_line(
    strategy: StrategyKind,
    order: &[Arc<UnitDescriptor>],
    phases: &[ExecutionPhase],
) -> JsonPlanLine {
    JsonPlanLine {
        kind: "plan",
        strategy: strategy.into(),
        order: order.iter().map(|u| u.name().to_string()).collect(),
        phases: phases
            .iter()
            .map(|p| JsonPhase {
                id: p.id,
                units: p.unit_names().into_iter().map(str::to_string).collect(),
                parallel: p.parallel,
                forced: p.forced,
                estimated_duration_secs: p.estimated_duration.as_secs_f64(),
            })
            .collect(),
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSummaryLine {
    pub kind: &'static str,
    pub success: bool,
    pub strategy: &'static str,
    pub total_duration_secs: f64,
    pub execution_order: Vec<String>,
    pub skipped: Vec<String>,
    pub units: Vec<JsonUnit>,
    pub resource_usage: JsonResourceUsage,
    pub optimization: JsonOptimization,
    pub suites: Vec<JsonSuite>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonUnit {
    pub name: String,
    pub success: bool,
    pub start_time: String,
    pub duration_secs: f64,
    pub retry_count: u32,
    pub concurrent_units: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonResourceUsage {
    pub peak_cpu_percent: f64,
    pub peak_memory_mb: f64,
    pub network_mbps: f64,
    pub concurrent_units: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonOptimization {
    pub parallelization_ratio: f64,
    pub resource_efficiency: f64,
    pub time_optimization: f64,
    pub failure_recovery_secs: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSuite {
    pub name: String,
    pub ran: bool,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<JsonScores>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scalability: Option<JsonScalability>,
    pub scenarios: Vec<JsonScenario>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonScores {
    pub throughput: f64,
    pub stability: f64,
    pub resource_efficiency: f64,
    pub overall: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonScalability {
    pub linear_scalability: f64,
    pub breaking_point: u32,
    pub resource_bottlenecks: Vec<String>,
    pub recommendations: Vec<String>,
    pub peak_cpu_usage: f64,
    pub peak_memory_usage: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonScenario {
    pub name: String,
    pub success: bool,
    pub concurrent_users: u32,
    pub elapsed_secs: f64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub throughput: f64,
    pub error_rate: f64,
    pub latency_mean_ms: f64,
    pub latency_min_ms: f64,
    pub latency_max_ms: f64,
    pub latency_p50_ms: f64,
    pub latency_p95_ms: f64,
    pub latency_p99_ms: f64,
    pub samples: usize,
    pub bottlenecks: Vec<JsonBottleneck>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonBottleneck {
    pub kind: String,
    pub severity: String,
    pub description: String,
    pub detected_at: String,
}

fn build_summary_line(result: &ExecutionResult, suites: &[SuiteReport]) -> JsonSummaryLine {
    let units = result
        .execution_order
        .iter()
        .filter_map(|name| result.results.get(name).map(|r| (name, r)))
        .map(|(name, r)| JsonUnit {
            name: name.clone(),
            success: r.success,
            start_time: r.start_time.to_rfc3339(),
            duration_secs: r.duration.as_secs_f64(),
            retry_count: r.retry_count,
            concurrent_units: r.resource_usage.concurrent_units,
            error: r.error.clone(),
        })
        .collect();

    let usage = &result.resource_usage;
    let m = &result.optimization_metrics;

    JsonSummaryLine {
        kind: "summary",
        success: result.success,
        strategy: result.strategy.into(),
        total_duration_secs: result.total_duration.as_secs_f64(),
        execution_order: result.execution_order.clone(),
        skipped: result.skipped.clone(),
        units,
        resource_usage: JsonResourceUsage {
            peak_cpu_percent: usage.peak_cpu_percent,
            peak_memory_mb: usage.peak_memory_mb,
            network_mbps: usage.network_mbps,
            concurrent_units: usage.concurrent_units,
        },
        optimization: JsonOptimization {
            parallelization_ratio: m.parallelization_ratio,
            resource_efficiency: m.resource_efficiency,
            time_optimization: m.time_optimization,
            failure_recovery_secs: m.failure_recovery_time.as_secs_f64(),
        },
        suites: suites.iter().map(build_suite).collect(),
    }
}

fn build_suite(suite: &SuiteReport) -> JsonSuite {
    let Some(report) = &suite.report else {
        return JsonSuite {
            name: suite.name.clone(),
            ran: false,
            success: false,
            scores: None,
            scalability: None,
            scenarios: Vec::new(),
        };
    };
    JsonSuite {
        name: suite.name.clone(),
        ran: true,
        success: report.success,
        scores: Some(JsonScores {
            throughput: report.scores.throughput,
            stability: report.scores.stability,
            resource_efficiency: report.scores.resource_efficiency,
            overall: report.scores.overall,
        }),
        scalability: Some(build_scalability(report)),
        scenarios: report.scenarios.iter().map(build_scenario).collect(),
    }
}

fn build_scalability(report: &LoadTestReport) -> JsonScalability {
    let sc = &report.scalability;
    JsonScalability {
        linear_scalability: sc.linear_scalability,
        breaking_point: sc.breaking_point,
        resource_bottlenecks: sc.resource_bottlenecks.iter().map(|k| k.to_string()).collect(),
        recommendations: sc.recommendations.clone(),
        peak_cpu_usage: report.system_metrics.peak_cpu_usage,
        peak_memory_usage: report.system_metrics.peak_memory_usage,
    }
}

fn build_scenario(s: &ScenarioResult) -> JsonScenario {
    let rt = &s.response_times;
    JsonScenario {
        name: s.name.clone(),
        success: s.success,
        concurrent_users: s.concurrent_users,
        elapsed_secs: s.elapsed.as_secs_f64(),
        total_requests: s.total_requests,
        successful_requests: s.successful_requests,
        failed_requests: s.failed_requests,
        throughput: s.throughput,
        error_rate: s.error_rate,
        latency_mean_ms: rt.average,
        latency_min_ms: rt.min,
        latency_max_ms: rt.max,
        latency_p50_ms: rt.p50,
        latency_p95_ms: rt.p95,
        latency_p99_ms: rt.p99,
        samples: s.time_series.len(),
        bottlenecks: s
            .bottlenecks
            .iter()
            .map(|b| JsonBottleneck {
                kind: b.kind.to_string(),
                severity: b.severity.to_string(),
                description: b.description.clone(),
                detected_at: b.detected_at.to_rfc3339(),
            })
            .collect(),
    }
}

fn emit_json_line<T: Serialize>(line: &T) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer(&mut out, line)?;
    writeln!(out)?;
    Ok(())
}
