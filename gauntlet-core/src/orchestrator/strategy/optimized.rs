use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use ahash::AHashSet;
use tracing::{debug, info};

use super::RunState;
use crate::Result;
use crate::orchestrator::exec::run_unit;
use crate::orchestrator::{PhaseBudget, UnitDescriptor};

/// A batch of units scheduled together.
#[derive(Debug, Clone)]
pub struct ExecutionPhase {
    pub id: usize,
    pub units: Vec<Arc<UnitDescriptor>>,
    /// More than one unit and all of them allow concurrency.
    pub parallel: bool,
    pub estimated_duration: Duration,
    /// The phase holds a single unit that did not fit the phase budget on
    /// its own and was scheduled anyway to keep the run moving.
    pub forced: bool,
}

impl ExecutionPhase {
    fn new(id: usize, units: Vec<Arc<UnitDescriptor>>, forced: bool) -> Self {
        let parallel = units.len() > 1 && units.iter().all(|u| u.requirement().concurrency_allowed);
        let estimated_duration = if parallel {
            units
                .iter()
                .map(|u| u.estimated_duration())
                .max()
                .unwrap_or_default()
        } else {
            units.iter().map(|u| u.estimated_duration()).sum()
        };
        Self {
            id,
            units,
            parallel,
            estimated_duration,
            forced,
        }
    }

    pub fn unit_names(&self) -> Vec<&str> {
        self.units.iter().map(|u| u.name()).collect()
    }
}

fn by_priority_then_footprint(a: &Arc<UnitDescriptor>, b: &Arc<UnitDescriptor>) -> Ordering {
    b.priority().cmp(&a.priority()).then_with(|| {
        a.requirement()
            .footprint()
            .total_cmp(&b.requirement().footprint())
    })
}

/// Packs units into phases.
///
/// Candidates are taken by descending priority, then ascending cpu+memory
/// footprint. A unit is eligible once all of its dependencies sit in earlier
/// phases. Each phase fills up while its summed cpu and memory stay within
/// `budget`; an exclusive unit only opens a phase and closes it straight
/// away. When nothing fits an empty phase, the first eligible unit is
/// scheduled alone.
pub fn plan_phases(units: &[Arc<UnitDescriptor>], budget: &PhaseBudget) -> Vec<ExecutionPhase> {
    let mut candidates: Vec<Arc<UnitDescriptor>> = units.to_vec();
    // Stable sort: ties keep dependency order.
    candidates.sort_by(by_priority_then_footprint);

    let mut scheduled: AHashSet<String> = AHashSet::with_capacity(units.len());
    let mut phases = Vec::new();

    while scheduled.len() < candidates.len() {
        let ready = |u: &Arc<UnitDescriptor>, scheduled: &AHashSet<String>| {
            !scheduled.contains(u.name()) && u.dependencies().iter().all(|d| scheduled.contains(d))
        };

        let mut members: Vec<Arc<UnitDescriptor>> = Vec::new();
        let (mut cpu, mut memory) = (0.0, 0.0);

        for unit in candidates.iter().filter(|u| ready(*u, &scheduled)) {
            let req = unit.requirement();
            let next_cpu = cpu + req.cpu_percent;
            let next_memory = memory + req.memory_mb;
            if !budget.admits(next_cpu, next_memory) {
                continue;
            }
            if !req.concurrency_allowed {
                if members.is_empty() {
                    members.push(Arc::clone(unit));
                    break;
                }
                continue;
            }
            members.push(Arc::clone(unit));
            cpu = next_cpu;
            memory = next_memory;
        }

        let mut forced = false;
        if members.is_empty() {
            let Some(unit) = candidates.iter().find(|u| ready(*u, &scheduled)) else {
                // Unsatisfiable dependencies; the resolver rejects these upfront.
                break;
            };
            members.push(Arc::clone(unit));
            forced = true;
        }

        for unit in &members {
            scheduled.insert(unit.name().to_string());
        }
        phases.push(ExecutionPhase::new(phases.len(), members, forced));
    }

    phases
}

pub(super) async fn execute(
    ordered: &[Arc<UnitDescriptor>],
    budget: &PhaseBudget,
    state: &mut RunState,
) -> Result<()> {
    let phases = plan_phases(ordered, budget);
    info!(phases = phases.len(), "planned execution phases");

    for phase in &phases {
        debug!(
            phase = phase.id,
            units = ?phase.unit_names(),
            parallel = phase.parallel,
            forced = phase.forced,
            "phase starting"
        );

        if phase.parallel {
            let batch = phase.units.len();
            let handles: Vec<_> = phase
                .units
                .iter()
                .map(|unit| tokio::spawn(run_unit(Arc::clone(unit), batch)))
                .collect();
            for (unit, handle) in phase.units.iter().zip(handles) {
                let result = handle.await?;
                state.ledger.record_peak(&result.resource_usage);
                state.record(unit, result);
            }
        } else {
            for unit in &phase.units {
                let result = run_unit(Arc::clone(unit), 1).await;
                state.ledger.record_peak(&result.resource_usage);
                state.record(unit, result);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::ResourceRequirement;

    fn unit(name: &str, priority: i32, cpu: f64, mem: f64, deps: &[&str]) -> Arc<UnitDescriptor> {
        let mut u = UnitDescriptor::new(name, || async { Ok(()) })
            .with_priority(priority)
            .with_requirement(ResourceRequirement::new(cpu, mem, 0.0))
            .with_estimated_duration(Duration::from_secs(10));
        for d in deps {
            u = u.depends_on(*d);
        }
        Arc::new(u)
    }

    fn names(phases: &[ExecutionPhase]) -> Vec<Vec<&str>> {
        phases.iter().map(|p| p.unit_names()).collect()
    }

    #[test]
    fn packs_within_budget() {
        let units = vec![
            unit("a", 0, 30.0, 1024.0, &[]),
            unit("b", 0, 30.0, 1024.0, &[]),
            unit("c", 0, 30.0, 1024.0, &[]),
        ];
        let phases = plan_phases(&units, &PhaseBudget::default());
        assert_eq!(names(&phases), [vec!["a", "b"], vec!["c"]]);
        assert!(phases[0].parallel);
        assert!(!phases[1].parallel);
        assert_eq!(phases[0].estimated_duration, Duration::from_secs(10));
        for phase in &phases {
            let cpu: f64 = phase.units.iter().map(|u| u.requirement().cpu_percent).sum();
            assert!(cpu <= 80.0);
        }
    }

    #[test]
    fn higher_priority_goes_first_then_smaller_footprint() {
        let units = vec![
            unit("big", 1, 50.0, 4000.0, &[]),
            unit("small", 1, 10.0, 100.0, &[]),
            unit("urgent", 5, 70.0, 100.0, &[]),
        ];
        let phases = plan_phases(&units, &PhaseBudget::default());
        assert_eq!(names(&phases), [vec!["urgent", "small"], vec!["big"]]);
    }

    #[test]
    fn dependencies_land_in_later_phases() {
        let units = vec![
            unit("a", 0, 10.0, 10.0, &[]),
            unit("b", 9, 10.0, 10.0, &["a"]),
            unit("c", 0, 10.0, 10.0, &["a"]),
            unit("d", 0, 10.0, 10.0, &["b", "c"]),
        ];
        let phases = plan_phases(&units, &PhaseBudget::default());
        assert_eq!(names(&phases), [vec!["a"], vec!["b", "c"], vec!["d"]]);
    }

    #[test]
    fn exclusive_units_run_alone() {
        let exclusive = Arc::new(
            UnitDescriptor::new("solo", || async { Ok(()) })
                .with_priority(1)
                .with_requirement(ResourceRequirement::new(5.0, 5.0, 0.0).exclusive()),
        );
        let units = vec![
            unit("a", 2, 10.0, 10.0, &[]),
            Arc::clone(&exclusive),
            unit("b", 0, 10.0, 10.0, &[]),
        ];
        let phases = plan_phases(&units, &PhaseBudget::default());
        assert_eq!(names(&phases), [vec!["a", "b"], vec!["solo"]]);
        assert!(!phases[1].parallel);
    }

    #[test]
    fn oversized_unit_is_forced_into_its_own_phase() {
        let units = vec![
            unit("huge", 0, 95.0, 7000.0, &[]),
            unit("tiny", 0, 1.0, 1.0, &["huge"]),
        ];
        let phases = plan_phases(&units, &PhaseBudget::default());
        assert_eq!(names(&phases), [vec!["huge"], vec!["tiny"]]);
        assert!(phases[0].forced);
        assert!(!phases[1].forced);
    }

    #[test]
    fn every_unit_is_scheduled_exactly_once() {
        let units: Vec<_> = (0..12)
            .map(|i| unit(&format!("u{i}"), i % 3, 15.0 + i as f64, 900.0, &[]))
            .collect();
        let phases = plan_phases(&units, &PhaseBudget::default());
        let mut all: Vec<&str> = phases.iter().flat_map(|p| p.unit_names()).collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 12);
    }
}
