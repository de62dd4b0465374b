use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use gauntlet_core::load::{LoadTestReport, ScenarioResult};
use gauntlet_core::orchestrator::{ExecutionPhase, ExecutionResult, StrategyKind, UnitDescriptor};

use super::{OutputFormatter, SuiteInfo, SuiteReport};

pub(crate) struct HumanReadableOutput;

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, plan_path: &Path, strategy: StrategyKind, suites: &[SuiteInfo]) {
        println!("plan: {}", plan_path.display());
        println!("strategy: {strategy}");
        for suite in suites {
            let scenarios = suite
                .scenarios
                .iter()
                .filter(|s| s.enabled)
                .map(|s| {
                    format!(
                        "{}({} users, {})",
                        s.name,
                        s.concurrent_users,
                        format_duration(s.duration)
                    )
                })
                .collect::<Vec<_>>()
                .join(" ");
            println!("suite: {} target={} {scenarios}", suite.name, suite.base_url);
        }
        println!();
    }

    fn print_plan(
        &self,
        strategy: StrategyKind,
        order: &[Arc<UnitDescriptor>],
        phases: &[ExecutionPhase],
    ) -> anyhow::Result<()> {
        print!("{}", render_plan(strategy, order, phases));
        Ok(())
    }

    fn print_summary(&self, result: &ExecutionResult, suites: &[SuiteReport]) -> anyhow::Result<()> {
        print!("{}", render_summary(result, suites));
        Ok(())
    }
}

fn render_plan(
    strategy: StrategyKind,
    order: &[Arc<UnitDescriptor>],
    phases: &[ExecutionPhase],
) -> String {
    let mut out = String::new();
    let names: Vec<&str> = order.iter().map(|u| u.name()).collect();
    writeln!(out, "dependency order: {}", names.join(" -> ")).ok();

    if strategy == StrategyKind::Optimized {
        for phase in phases {
            writeln!(
                out,
                "phase {}: {} ({}, ~{}){}",
                phase.id,
                phase.unit_names().join(", "),
                if phase.parallel { "parallel" } else { "sequential" },
                format_duration(phase.estimated_duration),
                if phase.forced { " [over budget]" } else { "" }
            )
            .ok();
        }
    }
    out
}

fn render_summary(result: &ExecutionResult, suites: &[SuiteReport]) -> String {
    let mut out = String::new();

    out.push_str("units\n");
    for name in &result.execution_order {
        let Some(r) = result.results.get(name) else {
            continue;
        };
        let status = if r.success { "ok" } else { "FAIL" };
        write!(out, "  {status:<4} {name} in {}", format_duration(r.duration)).ok();
        if r.retry_count > 0 {
            write!(out, " (retries {})", r.retry_count).ok();
        }
        if let Some(err) = &r.error {
            write!(out, ": {err}").ok();
        }
        out.push('\n');
    }
    for name in &result.skipped {
        writeln!(out, "  skip {name}").ok();
    }
    out.push('\n');

    for suite in suites {
        match &suite.report {
            Some(report) => render_report(&suite.name, report, &mut out),
            None => {
                writeln!(out, "suite: {} (not run)", suite.name).ok();
            }
        }
        out.push('\n');
    }

    let m = &result.optimization_metrics;
    writeln!(
        out,
        "result: {} in {} (strategy {}, parallelized {:.0}%, time saved {:.0}%)",
        if result.success { "PASS" } else { "FAIL" },
        format_duration(result.total_duration),
        result.strategy,
        m.parallelization_ratio * 100.0,
        (m.time_optimization * 100.0).max(0.0)
    )
    .ok();
    out
}

fn render_report(name: &str, report: &LoadTestReport, out: &mut String) {
    let s = &report.scores;
    writeln!(
        out,
        "suite: {name} {} score {:.1} (throughput {:.1}, stability {:.1}, resources {:.1})",
        if report.success { "PASS" } else { "FAIL" },
        s.overall,
        s.throughput,
        s.stability,
        s.resource_efficiency
    )
    .ok();

    for scenario in &report.scenarios {
        render_scenario(scenario, out);
    }

    let sys = &report.system_metrics;
    writeln!(
        out,
        "  system: peak users {} peak rps {:.1} cpu avg {:.1}% peak {:.1}% memory avg {:.1}% peak {:.1}%",
        sys.peak_concurrent_users,
        sys.peak_throughput,
        sys.average_cpu_usage,
        sys.peak_cpu_usage,
        sys.average_memory_usage,
        sys.peak_memory_usage
    )
    .ok();

    let sc = &report.scalability;
    writeln!(
        out,
        "  scalability: linear {:.1}% breaking point {} users",
        sc.linear_scalability, sc.breaking_point
    )
    .ok();
    for kind in &sc.resource_bottlenecks {
        writeln!(out, "    systemic bottleneck: {kind}").ok();
    }
    for rec in &sc.recommendations {
        writeln!(out, "    - {rec}").ok();
    }
}

fn render_scenario(s: &ScenarioResult, out: &mut String) {
    let rt = &s.response_times;
    writeln!(
        out,
        "  scenario: {} {} users={} elapsed={}",
        s.name,
        if s.success { "PASS" } else { "FAIL" },
        s.concurrent_users,
        format_duration(s.elapsed)
    )
    .ok();
    writeln!(
        out,
        "    requests: {} (failed {}) rps={:.1} errors={:.2}%",
        s.total_requests, s.failed_requests, s.throughput, s.error_rate
    )
    .ok();
    writeln!(
        out,
        "    latency = p50={:.1}ms p95={:.1}ms p99={:.1}ms mean={:.1}ms max={:.1}ms",
        rt.p50, rt.p95, rt.p99, rt.average, rt.max
    )
    .ok();
    if !s.bottlenecks.is_empty() {
        writeln!(out, "    bottlenecks: {}", s.bottlenecks.len()).ok();
        // The first occurrence of each kind is representative.
        let mut seen = Vec::new();
        for b in &s.bottlenecks {
            if seen.contains(&b.kind) {
                continue;
            }
            seen.push(b.kind);
            writeln!(out, "      {} {}: {}", b.severity, b.kind, b.description).ok();
        }
    }
}

fn format_duration(d: Duration) -> String {
    if d >= Duration::from_secs(1) {
        let secs = d.as_secs_f64();
        if secs.fract() < 0.05 {
            format!("{secs:.0}s")
        } else {
            format!("{secs:.1}s")
        }
    } else {
        format!("{}ms", d.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_duration_picks_unit() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
    }

    #[test]
    fn plan_lists_dependency_order() {
        let order = vec![
            Arc::new(UnitDescriptor::new("a", || async { Ok(()) })),
            Arc::new(UnitDescriptor::new("b", || async { Ok(()) }).depends_on("a")),
        ];
        let out = render_plan(StrategyKind::Sequential, &order, &[]);
        assert_eq!(out, "dependency order: a -> b\n");
    }
}
