use std::collections::BTreeMap;

use super::bottleneck::BottleneckKind;
use super::report::ScenarioResult;

/// Estimated headroom above the largest scenario when none failed.
const BREAKING_POINT_MARGIN: u32 = 50;
/// A bottleneck kind seen more often than this is systemic.
const SYSTEMIC_BOTTLENECK_COUNT: usize = 2;
const LINEAR_SCALABILITY_TARGET: f64 = 80.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ScalabilityAnalysis {
    /// Measured throughput growth relative to user growth, capped at 100.
    pub linear_scalability: f64,
    pub breaking_point: u32,
    pub resource_bottlenecks: Vec<BottleneckKind>,
    pub recommendations: Vec<String>,
}

pub fn analyze_scalability(scenarios: &[ScenarioResult]) -> ScalabilityAnalysis {
    let mut by_users: Vec<&ScenarioResult> = scenarios.iter().collect();
    by_users.sort_by_key(|s| s.concurrent_users);

    let linear_scalability = match (by_users.first(), by_users.last()) {
        (Some(low), Some(high)) if by_users.len() > 1 => {
            let expected = f64::from(high.concurrent_users) / f64::from(low.concurrent_users);
            if low.throughput <= 0.0 {
                0.0
            } else {
                let actual = high.throughput / low.throughput;
                (actual / expected * 100.0).clamp(0.0, 100.0)
            }
        }
        _ => 100.0,
    };

    let breaking_point = scenarios
        .iter()
        .filter(|s| !s.success)
        .map(|s| s.concurrent_users)
        .min()
        .unwrap_or_else(|| {
            by_users
                .last()
                .map_or(0, |s| s.concurrent_users)
                .saturating_add(BREAKING_POINT_MARGIN)
        });

    let mut counts: BTreeMap<BottleneckKind, usize> = BTreeMap::new();
    for b in scenarios.iter().flat_map(|s| &s.bottlenecks) {
        *counts.entry(b.kind).or_default() += 1;
    }
    let resource_bottlenecks: Vec<BottleneckKind> = counts
        .into_iter()
        .filter(|&(_, n)| n > SYSTEMIC_BOTTLENECK_COUNT)
        .map(|(kind, _)| kind)
        .collect();

    let recommendations = recommendations(linear_scalability, &resource_bottlenecks);

    ScalabilityAnalysis {
        linear_scalability,
        breaking_point,
        resource_bottlenecks,
        recommendations,
    }
}

fn recommendations(linear_scalability: f64, systemic: &[BottleneckKind]) -> Vec<String> {
    let mut out = Vec::new();
    if linear_scalability < LINEAR_SCALABILITY_TARGET {
        out.push("throughput does not grow with load; review the system architecture".to_string());
    }
    for kind in systemic {
        let advice = match kind {
            BottleneckKind::Cpu => "cpu saturates under load; scale out horizontally",
            BottleneckKind::Memory => "memory pressure recurs; improve memory efficiency or add capacity",
            BottleneckKind::Network => "network saturates under load; raise bandwidth or compress payloads",
            BottleneckKind::Application => {
                "the application degrades under load; tune slow handlers and database access"
            }
        };
        out.push(advice.to_string());
    }
    if out.is_empty() {
        out.push("scalability is healthy at the tested load levels".to_string());
    }
    out
}
