mod exec;
mod ledger;
mod metrics;
mod registry;
mod resolver;
mod result;
mod run;
mod strategy;
mod unit;

pub(crate) use exec::panic_message;
pub use ledger::{PhaseBudget, ResourceBudget, ResourceLedger};
pub use metrics::{OptimizationMetrics, optimization_metrics};
pub use registry::UnitRegistry;
pub use resolver::resolve;
pub use result::ExecutionResult;
pub use run::{Orchestrator, OrchestratorConfig};
pub use strategy::{ExecutionPhase, StrategyKind, plan_phases};
pub use unit::{
    ResourceRequirement, ResourceUsage, UnitDescriptor, UnitError, UnitFuture, UnitResult,
};
