mod dependency_strict;
mod optimized;
mod parallel;
mod sequential;

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{PhaseBudget, ResourceLedger, UnitDescriptor, UnitResult};
use crate::Result;

pub use optimized::{ExecutionPhase, plan_phases};

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum StrategyKind {
    #[strum(to_string = "sequential")]
    Sequential,
    #[strum(to_string = "parallel")]
    Parallel,
    #[default]
    #[strum(to_string = "optimized", serialize = "resource-optimized")]
    Optimized,
    #[strum(to_string = "dependency-aware", serialize = "dependency-strict")]
    DependencyAware,
}

/// Mutable bookkeeping shared by the strategies during one run.
#[derive(Debug)]
pub(crate) struct RunState {
    pub(crate) ledger: ResourceLedger,
    pub(crate) results: BTreeMap<String, UnitResult>,
    pub(crate) order: Vec<String>,
    pub(crate) skipped: Vec<String>,
}

impl RunState {
    pub(crate) fn new(ledger: ResourceLedger) -> Self {
        Self {
            ledger,
            results: BTreeMap::new(),
            order: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub(crate) fn has_result(&self, name: &str) -> bool {
        self.results.contains_key(name)
    }

    pub(crate) fn record(&mut self, unit: &UnitDescriptor, result: UnitResult) {
        self.order.push(unit.name().to_string());
        self.results.insert(unit.name().to_string(), result);
    }
}

impl StrategyKind {
    /// Runs `ordered` (dependencies first) to completion, recording one
    /// result per unit unless the strategy aborts early.
    pub(crate) async fn execute(
        self,
        ordered: &[Arc<UnitDescriptor>],
        phase_budget: &PhaseBudget,
        state: &mut RunState,
    ) -> Result<()> {
        match self {
            Self::Sequential => sequential::execute(ordered, state).await,
            Self::Parallel => parallel::execute(ordered, state).await,
            Self::Optimized => optimized::execute(ordered, phase_budget, state).await,
            Self::DependencyAware => dependency_strict::execute(ordered, state).await,
        }
    }
}
