use std::sync::Arc;

use tracing::warn;

use super::RunState;
use crate::Result;
use crate::orchestrator::exec::run_unit;
use crate::orchestrator::{UnitDescriptor, resolve};

/// Re-derives the dependency order, runs it one unit at a time and stops at
/// the first failure. Units after the failure are listed as skipped.
pub(super) async fn execute(ordered: &[Arc<UnitDescriptor>], state: &mut RunState) -> Result<()> {
    let order = resolve(ordered)?;

    let mut units = order.iter();
    while let Some(unit) = units.next() {
        let result = run_unit(Arc::clone(unit), 1).await;
        let failed = !result.success;
        state.ledger.record_peak(&result.resource_usage);
        state.record(unit, result);

        if failed {
            state.skipped = units.map(|u| u.name().to_string()).collect();
            warn!(
                unit = %unit.name(),
                skipped = state.skipped.len(),
                "unit failed, aborting remaining units"
            );
            break;
        }
    }
    Ok(())
}
