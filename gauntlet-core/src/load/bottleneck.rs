use chrono::{DateTime, Utc};

use super::config::Thresholds;
use super::report::TimeSeriesSample;

// Absolute ceilings above which a breach is critical.
const CRITICAL_CPU_PERCENT: f64 = 90.0;
const CRITICAL_MEMORY_PERCENT: f64 = 90.0;
const CRITICAL_ERROR_RATE: f64 = 10.0;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum BottleneckKind {
    Cpu,
    Memory,
    Network,
    Application,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Critical,
    Major,
    Minor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bottleneck {
    pub kind: BottleneckKind,
    pub severity: Severity,
    pub description: String,
    pub impact: String,
    pub recommendation: String,
    pub detected_at: DateTime<Utc>,
}

fn severity(critical: bool) -> Severity {
    if critical {
        Severity::Critical
    } else {
        Severity::Major
    }
}

/// Flags every metric of `sample` that breaches its threshold.
pub fn detect_bottlenecks(sample: &TimeSeriesSample, thresholds: &Thresholds) -> Vec<Bottleneck> {
    let mut found = Vec::new();
    let mut flag = |kind, critical, description: String, impact: &str, recommendation: &str| {
        found.push(Bottleneck {
            kind,
            severity: severity(critical),
            description,
            impact: impact.to_string(),
            recommendation: recommendation.to_string(),
            detected_at: sample.timestamp,
        });
    };

    if sample.cpu_usage > thresholds.max_cpu_usage {
        flag(
            BottleneckKind::Cpu,
            sample.cpu_usage > CRITICAL_CPU_PERCENT,
            format!(
                "cpu usage {:.1}% exceeds {:.1}%",
                sample.cpu_usage, thresholds.max_cpu_usage
            ),
            "response times degrade as requests queue for cpu",
            "profile hot paths or scale out horizontally",
        );
    }

    if sample.memory_usage > thresholds.max_memory_usage {
        flag(
            BottleneckKind::Memory,
            sample.memory_usage > CRITICAL_MEMORY_PERCENT,
            format!(
                "memory usage {:.1}% exceeds {:.1}%",
                sample.memory_usage, thresholds.max_memory_usage
            ),
            "risk of swapping or out-of-memory termination",
            "look for leaks and oversized caches, or add memory",
        );
    }

    if sample.average_response_time_ms > thresholds.max_response_time_ms {
        flag(
            BottleneckKind::Application,
            sample.average_response_time_ms > thresholds.max_response_time_ms * 2.0,
            format!(
                "average response time {:.0}ms exceeds {:.0}ms",
                sample.average_response_time_ms, thresholds.max_response_time_ms
            ),
            "users wait noticeably for responses",
            "optimize slow handlers and database queries, consider caching",
        );
    }

    if sample.error_rate > thresholds.max_error_rate {
        flag(
            BottleneckKind::Application,
            sample.error_rate > CRITICAL_ERROR_RATE,
            format!(
                "error rate {:.1}% exceeds {:.1}%",
                sample.error_rate, thresholds.max_error_rate
            ),
            "a share of user requests fail outright",
            "inspect server logs for failing endpoints and add backpressure",
        );
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sample(cpu: f64, memory: f64, latency_ms: f64, error_rate: f64) -> TimeSeriesSample {
        TimeSeriesSample {
            timestamp: Utc::now(),
            elapsed: Duration::from_secs(5),
            active_users: 10,
            requests_per_second: 20.0,
            average_response_time_ms: latency_ms,
            error_rate,
            cpu_usage: cpu,
            memory_usage: memory,
        }
    }

    #[test]
    fn cpu_severity_uses_absolute_ceiling() {
        let t = Thresholds::default();
        let critical = detect_bottlenecks(&sample(95.0, 10.0, 100.0, 0.0), &t);
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].kind, BottleneckKind::Cpu);
        assert_eq!(critical[0].severity, Severity::Critical);

        let major = detect_bottlenecks(&sample(85.0, 10.0, 100.0, 0.0), &t);
        assert_eq!(major.len(), 1);
        assert_eq!(major[0].severity, Severity::Major);
    }

    #[test]
    fn response_time_is_critical_above_twice_the_threshold() {
        let t = Thresholds::default();
        let major = detect_bottlenecks(&sample(10.0, 10.0, 3000.0, 0.0), &t);
        assert_eq!(major[0].kind, BottleneckKind::Application);
        assert_eq!(major[0].severity, Severity::Major);

        let critical = detect_bottlenecks(&sample(10.0, 10.0, 4500.0, 0.0), &t);
        assert_eq!(critical[0].severity, Severity::Critical);
    }

    #[test]
    fn error_rate_and_memory() {
        let t = Thresholds::default();
        let found = detect_bottlenecks(&sample(10.0, 92.0, 100.0, 7.0), &t);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].kind, BottleneckKind::Memory);
        assert_eq!(found[0].severity, Severity::Critical);
        assert_eq!(found[1].kind, BottleneckKind::Application);
        assert_eq!(found[1].severity, Severity::Major);
    }

    #[test]
    fn healthy_sample_has_no_bottlenecks() {
        let found = detect_bottlenecks(&sample(50.0, 50.0, 300.0, 1.0), &Thresholds::default());
        assert!(found.is_empty());
    }
}
