use std::collections::BTreeMap;
use std::time::Duration;

use super::{OptimizationMetrics, ResourceUsage, StrategyKind, UnitResult};

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    /// True when every unit ran and succeeded.
    pub success: bool,
    pub strategy: StrategyKind,
    pub results: BTreeMap<String, UnitResult>,
    /// Unit names in the order their results were recorded.
    pub execution_order: Vec<String>,
    /// Units left without a result after an early abort.
    pub skipped: Vec<String>,
    pub total_duration: Duration,
    pub resource_usage: ResourceUsage,
    pub optimization_metrics: OptimizationMetrics,
}

impl ExecutionResult {
    pub fn failed_units(&self) -> impl Iterator<Item = (&str, &UnitResult)> {
        self.results
            .iter()
            .filter(|(_, r)| !r.success)
            .map(|(name, r)| (name.as_str(), r))
    }
}
