use std::path::Path;
use std::sync::Arc;

use gauntlet_core::load::{LoadScenario, LoadTestReport};
use gauntlet_core::orchestrator::{ExecutionPhase, ExecutionResult, StrategyKind, UnitDescriptor};

use crate::cli::OutputFormat;

mod human;
mod json;

/// What a suite is about to run, for the header.
#[derive(Debug, Clone)]
pub(crate) struct SuiteInfo {
    pub name: String,
    pub base_url: String,
    pub scenarios: Vec<LoadScenario>,
}

/// A suite's load report, absent when its unit never ran.
#[derive(Debug)]
pub(crate) struct SuiteReport {
    pub name: String,
    pub report: Option<LoadTestReport>,
}

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, plan_path: &Path, strategy: StrategyKind, suites: &[SuiteInfo]);
    fn print_plan(
        &self,
        strategy: StrategyKind,
        order: &[Arc<UnitDescriptor>],
        phases: &[ExecutionPhase],
    ) -> anyhow::Result<()>;
    fn print_summary(&self, result: &ExecutionResult, suites: &[SuiteReport]) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
