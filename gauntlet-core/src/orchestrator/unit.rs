use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

pub type UnitFuture = Pin<Box<dyn Future<Output = Result<(), UnitError>> + Send + 'static>>;

type UnitAction = Arc<dyn Fn() -> UnitFuture + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnitError {
    #[error("{0}")]
    Failed(String),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("panicked: {0}")]
    Panicked(String),

    #[error("cancelled")]
    Cancelled,
}

impl UnitError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// Declared resource needs of a unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceRequirement {
    pub cpu_percent: f64,
    pub memory_mb: f64,
    pub network_mbps: f64,
    /// Whether the unit may share a batch with other units.
    pub concurrency_allowed: bool,
}

impl Default for ResourceRequirement {
    fn default() -> Self {
        Self {
            cpu_percent: 0.0,
            memory_mb: 0.0,
            network_mbps: 0.0,
            concurrency_allowed: true,
        }
    }
}

impl ResourceRequirement {
    pub fn new(cpu_percent: f64, memory_mb: f64, network_mbps: f64) -> Self {
        Self {
            cpu_percent,
            memory_mb,
            network_mbps,
            concurrency_allowed: true,
        }
    }

    #[must_use]
    pub fn exclusive(mut self) -> Self {
        self.concurrency_allowed = false;
        self
    }

    pub(crate) fn footprint(&self) -> f64 {
        self.cpu_percent + self.memory_mb
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceUsage {
    pub peak_cpu_percent: f64,
    pub peak_memory_mb: f64,
    pub network_mbps: f64,
    /// Units that ran in the same concurrent batch, this one included.
    pub concurrent_units: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitResult {
    pub success: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: Duration,
    pub retry_count: u32,
    pub resource_usage: ResourceUsage,
    pub error: Option<String>,
}

/// A registered piece of work.
///
/// Descriptors are immutable once built; the action is invoked once per
/// attempt and must produce a fresh future each time.
#[derive(Clone)]
pub struct UnitDescriptor {
    name: String,
    priority: i32,
    dependencies: Vec<String>,
    estimated_duration: Duration,
    requirement: ResourceRequirement,
    timeout: Option<Duration>,
    max_retries: u32,
    action: UnitAction,
}

impl fmt::Debug for UnitDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitDescriptor")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("dependencies", &self.dependencies)
            .field("estimated_duration", &self.estimated_duration)
            .field("requirement", &self.requirement)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl UnitDescriptor {
    pub fn new<F, Fut>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), UnitError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            priority: 0,
            dependencies: Vec::new(),
            estimated_duration: Duration::ZERO,
            requirement: ResourceRequirement::default(),
            timeout: None,
            max_retries: 0,
            action: Arc::new(move || -> UnitFuture { Box::pin(action()) }),
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn depends_on(mut self, dependency: impl Into<String>) -> Self {
        let dependency = dependency.into();
        if !self.dependencies.contains(&dependency) {
            self.dependencies.push(dependency);
        }
        self
    }

    #[must_use]
    pub fn with_requirement(mut self, requirement: ResourceRequirement) -> Self {
        self.requirement = requirement;
        self
    }

    #[must_use]
    pub fn with_estimated_duration(mut self, estimated: Duration) -> Self {
        self.estimated_duration = estimated;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn estimated_duration(&self) -> Duration {
        self.estimated_duration
    }

    pub fn requirement(&self) -> &ResourceRequirement {
        &self.requirement
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub(crate) fn start(&self) -> UnitFuture {
        (self.action)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependencies_are_deduplicated() {
        let unit = UnitDescriptor::new("d", || async { Ok(()) })
            .depends_on("b")
            .depends_on("c")
            .depends_on("b");
        assert_eq!(unit.dependencies(), ["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn exclusive_requirement_disallows_concurrency() {
        let req = ResourceRequirement::new(10.0, 256.0, 5.0).exclusive();
        assert!(!req.concurrency_allowed);
        assert!((req.footprint() - 266.0).abs() < 1e-9);
    }
}
