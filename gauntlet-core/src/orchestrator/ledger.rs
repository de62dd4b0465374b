use std::sync::Arc;

use super::{ResourceUsage, UnitDescriptor};
use crate::{Error, ResourceKind, Result};

/// Resources available to a whole run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceBudget {
    pub cpu_percent: f64,
    pub memory_mb: f64,
    pub network_mbps: f64,
}

impl Default for ResourceBudget {
    fn default() -> Self {
        Self {
            cpu_percent: 100.0,
            memory_mb: 8192.0,
            network_mbps: 1000.0,
        }
    }
}

/// Per-phase packing limits for the resource-optimized strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseBudget {
    pub cpu_percent: f64,
    pub memory_mb: f64,
}

impl Default for PhaseBudget {
    fn default() -> Self {
        Self {
            cpu_percent: 80.0,
            memory_mb: 6144.0,
        }
    }
}

impl PhaseBudget {
    pub(crate) fn admits(&self, cpu: f64, memory: f64) -> bool {
        cpu <= self.cpu_percent && memory <= self.memory_mb
    }
}

#[derive(Debug, Clone)]
pub struct ResourceLedger {
    budget: ResourceBudget,
    peak: ResourceUsage,
}

impl ResourceLedger {
    pub fn new(budget: ResourceBudget) -> Self {
        Self {
            budget,
            peak: ResourceUsage::default(),
        }
    }

    pub fn budget(&self) -> &ResourceBudget {
        &self.budget
    }

    /// Pre-flight check: the summed requirements of `units` must fit the
    /// budget in every dimension.
    pub fn capacity_check(&self, units: &[Arc<UnitDescriptor>]) -> Result<()> {
        let (cpu, memory, network) = units.iter().fold((0.0, 0.0, 0.0), |acc, u| {
            let r = u.requirement();
            (
                acc.0 + r.cpu_percent,
                acc.1 + r.memory_mb,
                acc.2 + r.network_mbps,
            )
        });

        let checks = [
            (ResourceKind::Cpu, cpu, self.budget.cpu_percent),
            (ResourceKind::Memory, memory, self.budget.memory_mb),
            (ResourceKind::Network, network, self.budget.network_mbps),
        ];
        for (resource, required, available) in checks {
            if required > available {
                return Err(Error::ResourceInsufficient {
                    resource,
                    required,
                    available,
                });
            }
        }
        Ok(())
    }

    /// Folds a completed unit's usage into the running peak. Every field
    /// keeps its maximum.
    pub fn record_peak(&mut self, usage: &ResourceUsage) {
        self.peak.peak_cpu_percent = self.peak.peak_cpu_percent.max(usage.peak_cpu_percent);
        self.peak.peak_memory_mb = self.peak.peak_memory_mb.max(usage.peak_memory_mb);
        self.peak.network_mbps = self.peak.network_mbps.max(usage.network_mbps);
        self.peak.concurrent_units = self.peak.concurrent_units.max(usage.concurrent_units);
    }

    /// Like [`record_peak`](Self::record_peak) but network bandwidth is
    /// summed, for strategies that overlap units freely.
    pub fn record_concurrent(&mut self, usage: &ResourceUsage) {
        let network = self.peak.network_mbps + usage.network_mbps;
        self.record_peak(usage);
        self.peak.network_mbps = network;
    }

    pub fn peak(&self) -> ResourceUsage {
        self.peak
    }

    pub fn concurrent_units_observed(&self) -> usize {
        self.peak.concurrent_units
    }
}
