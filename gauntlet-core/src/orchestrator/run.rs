use std::sync::Arc;

use tokio::time::Instant;
use tracing::info;

use super::strategy::RunState;
use super::{
    ExecutionPhase, ExecutionResult, PhaseBudget, ResourceBudget, ResourceLedger, StrategyKind,
    UnitDescriptor, UnitRegistry, optimization_metrics, plan_phases, resolve,
};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OrchestratorConfig {
    pub budget: ResourceBudget,
    pub phase_budget: PhaseBudget,
}

impl OrchestratorConfig {
    #[must_use]
    pub fn with_budget(mut self, budget: ResourceBudget) -> Self {
        self.budget = budget;
        self
    }

    #[must_use]
    pub fn with_phase_budget(mut self, phase_budget: PhaseBudget) -> Self {
        self.phase_budget = phase_budget;
        self
    }
}

/// Owns a unit registry and runs it with a chosen strategy.
#[derive(Debug, Default)]
pub struct Orchestrator {
    config: OrchestratorConfig,
    registry: UnitRegistry,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            registry: UnitRegistry::new(),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn register_unit(&mut self, unit: UnitDescriptor) -> Result<()> {
        info!(unit = %unit.name(), priority = unit.priority(), "registering unit");
        self.registry.register(unit)
    }

    pub fn units(&self) -> &[Arc<UnitDescriptor>] {
        self.registry.units()
    }

    pub fn resolve(&self) -> Result<Vec<Arc<UnitDescriptor>>> {
        resolve(self.registry.units())
    }

    /// The phases the resource-optimized strategy would run, without
    /// running anything.
    pub fn plan_phases(&self) -> Result<Vec<ExecutionPhase>> {
        let ordered = self.resolve()?;
        Ok(plan_phases(&ordered, &self.config.phase_budget))
    }

    pub async fn execute(&self, strategy: &str) -> Result<ExecutionResult> {
        let kind = strategy
            .parse::<StrategyKind>()
            .map_err(|_| Error::UnknownStrategy(strategy.to_string()))?;
        self.execute_with(kind).await
    }

    pub async fn execute_with(&self, strategy: StrategyKind) -> Result<ExecutionResult> {
        if self.registry.is_empty() {
            return Err(Error::NoUnits);
        }
        let ordered = self.resolve()?;

        let ledger = ResourceLedger::new(self.config.budget);
        ledger.capacity_check(&ordered)?;

        info!(%strategy, units = ordered.len(), "execution starting");
        let started = Instant::now();

        let mut state = RunState::new(ledger);
        strategy
            .execute(&ordered, &self.config.phase_budget, &mut state)
            .await?;

        let total_duration = started.elapsed();
        let success = state.skipped.is_empty()
            && state.results.len() == ordered.len()
            && state.results.values().all(|r| r.success);
        let optimization_metrics = optimization_metrics(&state.results, total_duration);

        info!(
            %strategy,
            success,
            ?total_duration,
            concurrent_units = state.ledger.concurrent_units_observed(),
            "execution finished"
        );

        Ok(ExecutionResult {
            success,
            strategy,
            resource_usage: state.ledger.peak(),
            results: state.results,
            execution_order: state.order,
            skipped: state.skipped,
            total_duration,
            optimization_metrics,
        })
    }
}
