use std::sync::Arc;

use tracing::debug;

use super::RunState;
use crate::Result;
use crate::orchestrator::UnitDescriptor;
use crate::orchestrator::exec::run_unit;

/// Runs units in dependency waves. Each wave launches every ready
/// concurrency-allowed unit at once and waits for all of them, then runs the
/// ready exclusive units one by one. Without dependencies this is a single
/// wave: the whole allowed set fans out, then the exclusive units follow.
pub(super) async fn execute(ordered: &[Arc<UnitDescriptor>], state: &mut RunState) -> Result<()> {
    let mut remaining: Vec<Arc<UnitDescriptor>> = ordered.to_vec();
    let mut wave = 0usize;

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<_>, Vec<_>) = remaining
            .into_iter()
            .partition(|u| u.dependencies().iter().all(|d| state.has_result(d)));
        remaining = blocked;

        let (shared, exclusive): (Vec<_>, Vec<_>) = ready
            .into_iter()
            .partition(|u| u.requirement().concurrency_allowed);
        debug!(
            wave,
            concurrent = shared.len(),
            exclusive = exclusive.len(),
            "parallel wave"
        );

        let batch = shared.len();
        let handles: Vec<_> = shared
            .iter()
            .map(|unit| tokio::spawn(run_unit(Arc::clone(unit), batch)))
            .collect();
        for (unit, handle) in shared.iter().zip(handles) {
            let result = handle.await?;
            state.ledger.record_concurrent(&result.resource_usage);
            state.record(unit, result);
        }

        for unit in &exclusive {
            let result = run_unit(Arc::clone(unit), 1).await;
            state.ledger.record_concurrent(&result.resource_usage);
            state.record(unit, result);
        }

        if batch == 0 && exclusive.is_empty() {
            // Only reachable with unresolved dependencies; the caller resolves first.
            state.skipped = remaining.iter().map(|u| u.name().to_string()).collect();
            break;
        }
        wave += 1;
    }
    Ok(())
}
