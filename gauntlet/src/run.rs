use std::sync::Arc;
use std::time::Duration;

use gauntlet_core::load::{
    FixedSampler, LoadEngine, LoadTestConfig, ReportSlot, ResourceSample, ResourceSampler,
    SyntheticSampler, UserProfile,
};
use gauntlet_core::orchestrator::{Orchestrator, OrchestratorConfig, StrategyKind, UnitDescriptor};
use tracing::info;

use crate::cli::RunArgs;
use crate::exit_codes::ExitCode;
use crate::output::{self, SuiteInfo, SuiteReport};
use crate::plan_yaml::{self, PlanYaml, SamplerYaml, SuiteYaml};
use crate::run_error::RunError;

/// The sampler a plan selects.
enum PlanSampler {
    Synthetic(SyntheticSampler),
    Fixed(FixedSampler),
}

impl PlanSampler {
    fn new(choice: SamplerYaml, seed: Option<u64>) -> Self {
        match choice {
            SamplerYaml::Synthetic => Self::Synthetic(SyntheticSampler::new(seed)),
            SamplerYaml::Fixed { cpu, memory } => Self::Fixed(FixedSampler::new(cpu, memory)),
        }
    }
}

impl ResourceSampler for PlanSampler {
    fn sample(&self) -> ResourceSample {
        match self {
            Self::Synthetic(s) => s.sample(),
            Self::Fixed(s) => s.sample(),
        }
    }
}

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let out = output::formatter(args.output);

    let plan = plan_yaml::load_plan(&args.plan)
        .await
        .map_err(RunError::InvalidInput)?;
    let doc = &plan.doc;

    let strategy = match (args.strategy, doc.strategy.as_deref()) {
        (Some(kind), _) => kind,
        (None, Some(name)) => name
            .parse::<StrategyKind>()
            .map_err(|_| gauntlet_core::Error::UnknownStrategy(name.to_string()))?,
        (None, None) => StrategyKind::default(),
    };
    let seed = args.seed.or(doc.seed);

    let config = OrchestratorConfig::default()
        .with_budget(doc.budget.resolve())
        .with_phase_budget(doc.phase_budget.resolve());
    let mut orchestrator = Orchestrator::new(config);

    let mut infos = Vec::with_capacity(plan.suites.len());
    let mut slots = Vec::with_capacity(plan.suites.len());
    for suite in &plan.suites {
        let base_url = args
            .target
            .as_ref()
            .or(suite.target.as_ref())
            .or(doc.target.as_ref())
            .cloned()
            .ok_or_else(|| {
                RunError::InvalidInput(anyhow::anyhow!(
                    "suite `{}` has no target URL (set `target` in the plan or pass --target)",
                    suite.name
                ))
            })?;

        let load_config = suite_config(doc, &plan.user_profiles, suite, base_url, seed);
        infos.push(SuiteInfo {
            name: suite.name.clone(),
            base_url: load_config.base_url.clone(),
            scenarios: load_config.scenarios.clone(),
        });

        let (unit, slot) = suite_unit(doc, suite, load_config, seed)?;
        orchestrator.register_unit(unit)?;
        slots.push((suite.name.clone(), slot));
    }

    if args.dry_run {
        let order = orchestrator.resolve()?;
        let phases = orchestrator.plan_phases()?;
        out.print_plan(strategy, &order, &phases)
            .map_err(RunError::RuntimeError)?;
        return Ok(ExitCode::Success);
    }

    out.print_header(&args.plan, strategy, &infos);
    info!(%strategy, suites = slots.len(), "running plan");

    let result = orchestrator.execute_with(strategy).await?;

    let reports: Vec<SuiteReport> = slots
        .into_iter()
        .map(|(name, slot)| SuiteReport {
            name,
            report: slot.take(),
        })
        .collect();
    out.print_summary(&result, &reports)
        .map_err(RunError::RuntimeError)?;

    Ok(ExitCode::from_success(result.success))
}

fn suite_config(
    doc: &PlanYaml,
    profiles: &[UserProfile],
    suite: &SuiteYaml,
    base_url: String,
    seed: Option<u64>,
) -> LoadTestConfig {
    let mut config = LoadTestConfig::new(base_url)
        .with_scenarios(
            suite
                .scenarios
                .iter()
                .cloned()
                .map(|s| s.into_scenario())
                .collect(),
        )
        .with_user_profiles(profiles.to_vec())
        .with_thresholds(doc.thresholds.resolve())
        .with_seed(seed);

    if let Some(d) = doc.ramp_up {
        config.ramp_up = d.into_inner();
    }
    if let Some(d) = doc.ramp_down {
        config.ramp_down = d.into_inner();
    }
    if let Some(d) = doc.sample_interval {
        config.sample_interval = d.into_inner();
    }
    if let Some(d) = doc.scenario_pause {
        config.scenario_pause = d.into_inner();
    }
    config
}

/// Builds the engine for a suite and wraps it as a unit with the suite's
/// scheduling settings.
fn suite_unit(
    doc: &PlanYaml,
    suite: &SuiteYaml,
    config: LoadTestConfig,
    seed: Option<u64>,
) -> Result<(UnitDescriptor, Arc<ReportSlot>), RunError> {
    let estimated = suite
        .estimated_duration
        .map(|d| d.into_inner())
        .unwrap_or_else(|| expected_duration(&config));

    let engine = LoadEngine::new(config)?.with_sampler(PlanSampler::new(doc.sampler, seed));
    let (unit, slot) = engine.into_unit(suite.name.clone());

    let mut unit = unit
        .with_priority(suite.priority)
        .with_requirement(suite.resources.requirement())
        .with_estimated_duration(estimated)
        .with_retries(suite.retries);
    for dependency in &suite.depends_on {
        unit = unit.depends_on(dependency.clone());
    }
    if let Some(timeout) = suite.timeout {
        unit = unit.with_timeout(timeout.into_inner());
    }
    Ok((unit, slot))
}

/// Ramp, steady state and pauses of every enabled scenario.
fn expected_duration(config: &LoadTestConfig) -> Duration {
    let enabled: Vec<_> = config.enabled_scenarios().collect();
    let pauses = config.scenario_pause * u32::try_from(enabled.len().saturating_sub(1)).unwrap_or(0);
    enabled
        .iter()
        .map(|s| config.ramp_up + s.duration + config.ramp_down)
        .sum::<Duration>()
        + pauses
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn expected_duration_counts_ramps_and_pauses() {
        let plan = plan_yaml::parse_plan(
            r"
target: http://127.0.0.1:1
rampUp: 10s
rampDown: 5s
scenarioPause: 2s
scenarios:
  - { name: a, users: 1, duration: 30s }
  - { name: b, users: 1, duration: 60s }
  - { name: c, users: 1, duration: 60s, enabled: false }
",
        )
        .unwrap();
        let config = suite_config(
            &plan.doc,
            &plan.user_profiles,
            &plan.suites[0],
            "http://127.0.0.1:1".into(),
            None,
        );
        assert_eq!(expected_duration(&config), Duration::from_secs(15 + 30 + 15 + 60 + 2));
    }

    #[test]
    fn fixed_sampler_is_selected_from_plan() {
        let sampler = PlanSampler::new(SamplerYaml::Fixed { cpu: 12.0, memory: 34.0 }, None);
        let sample = sampler.sample();
        assert_eq!(sample.cpu_percent, 12.0);
        assert_eq!(sample.memory_percent, 34.0);
    }
}
