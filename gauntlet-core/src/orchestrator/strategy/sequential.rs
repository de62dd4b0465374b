use std::sync::Arc;

use super::RunState;
use crate::Result;
use crate::orchestrator::UnitDescriptor;
use crate::orchestrator::exec::run_unit;

/// One unit at a time, continuing past failures.
pub(super) async fn execute(ordered: &[Arc<UnitDescriptor>], state: &mut RunState) -> Result<()> {
    for unit in ordered {
        let result = run_unit(Arc::clone(unit), 1).await;
        state.ledger.record_peak(&result.resource_usage);
        state.record(unit, result);
    }
    Ok(())
}
