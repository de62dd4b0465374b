mod action;
mod bottleneck;
mod config;
mod engine;
mod report;
mod sampler;
mod scalability;
mod score;
mod session;
mod target;

pub use action::{ActionError, ActionKind, ActionRequest, MAX_MESSAGE_CHARS};
pub use bottleneck::{Bottleneck, BottleneckKind, Severity, detect_bottlenecks};
pub use config::{
    LoadScenario, LoadTestConfig, MAX_CONCURRENT_USERS, ProfileKind, QueryComplexity, Thresholds,
    UserBehavior, UserProfile,
};
pub use engine::{LoadEngine, ReportSlot, ScenarioPhase};
pub use report::{
    LoadTestReport, ScenarioResult, SessionOutcome, SystemMetrics, TimeSeriesSample, UserMetrics,
    aggregate_scenario, system_metrics,
};
pub use sampler::{FixedSampler, ResourceSample, ResourceSampler, SyntheticSampler};
pub use scalability::{ScalabilityAnalysis, analyze_scalability};
pub use score::{LoadScores, compute_scores};
pub use target::{HttpTarget, Target};
