use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use gauntlet_metrics::LiveWindow;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::bottleneck::{Bottleneck, detect_bottlenecks};
use super::config::{LoadScenario, LoadTestConfig, ProfileKind, Thresholds, UserProfile};
use super::report::{
    LoadTestReport, ScenarioResult, SessionOutcome, TimeSeriesSample, aggregate_scenario,
};
use super::sampler::{ResourceSampler, SyntheticSampler};
use super::session::{ActiveSessions, VirtualUserSession};
use super::target::{HttpTarget, Target};
use crate::orchestrator::{UnitDescriptor, UnitError, panic_message};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ScenarioPhase {
    Idle,
    RampingUp,
    Steady,
    RampingDown,
    Completed,
}

/// Drives virtual users against a [`Target`] and measures the outcome.
#[derive(Debug)]
pub struct LoadEngine<T = HttpTarget, S = SyntheticSampler> {
    config: Arc<LoadTestConfig>,
    target: Arc<T>,
    sampler: Arc<S>,
}

impl LoadEngine {
    /// Validates `config` and targets its base URL over HTTP.
    pub fn new(config: LoadTestConfig) -> Result<Self> {
        config.validate()?;
        let target = HttpTarget::new(&config.base_url)?;
        let sampler = SyntheticSampler::new(config.seed);
        Ok(Self {
            config: Arc::new(config),
            target: Arc::new(target),
            sampler: Arc::new(sampler),
        })
    }
}

impl<T: Target, S: ResourceSampler> LoadEngine<T, S> {
    pub fn with_target<U: Target>(self, target: U) -> LoadEngine<U, S> {
        LoadEngine {
            config: self.config,
            target: Arc::new(target),
            sampler: self.sampler,
        }
    }

    pub fn with_sampler<U: ResourceSampler>(self, sampler: U) -> LoadEngine<T, U> {
        LoadEngine {
            config: self.config,
            target: self.target,
            sampler: Arc::new(sampler),
        }
    }

    pub fn config(&self) -> &LoadTestConfig {
        &self.config
    }

    fn rng(&self, stream: u64) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15)),
            None => StdRng::from_entropy(),
        }
    }

    /// Runs every configured scenario and analyses the results.
    pub async fn run(&self) -> Result<LoadTestReport> {
        let scenarios = self.run_all_scenarios(&self.config.scenarios).await?;
        let report = LoadTestReport::new(scenarios, &self.config.thresholds);

        info!(
            success = report.success,
            overall = report.scores.overall,
            linear_scalability = report.scalability.linear_scalability,
            breaking_point = report.scalability.breaking_point,
            "load test finished"
        );
        for kind in &report.scalability.resource_bottlenecks {
            warn!(%kind, "systemic bottleneck");
        }
        Ok(report)
    }

    /// Runs the enabled scenarios one after another, pausing in between.
    pub async fn run_all_scenarios(&self, scenarios: &[LoadScenario]) -> Result<Vec<ScenarioResult>> {
        let mut results = Vec::new();
        for (i, scenario) in scenarios.iter().filter(|s| s.enabled).enumerate() {
            if i > 0 && !self.config.scenario_pause.is_zero() {
                tokio::time::sleep(self.config.scenario_pause).await;
            }
            results.push(self.run_scenario(scenario).await?);
        }
        if results.is_empty() {
            return Err(Error::NoScenarios);
        }
        Ok(results)
    }

    pub async fn run_scenario(&self, scenario: &LoadScenario) -> Result<ScenarioResult> {
        scenario.validate()?;
        let config = &self.config;
        let users = scenario.concurrent_users;
        let mut phase = ScenarioPhase::Idle;

        info!(
            scenario = %scenario.name,
            users,
            duration = ?scenario.duration,
            "scenario starting"
        );
        let started = Instant::now();
        let window = Arc::new(LiveWindow::new());
        let active: Arc<ActiveSessions> = Arc::new(DashMap::new());

        // Sessions start evenly spread over the ramp-up window.
        enter(&mut phase, ScenarioPhase::RampingUp, &scenario.name);
        let stagger = config.ramp_up / users;
        let profile_weight: f64 = config.user_profiles.iter().map(|p| p.weight).sum();
        let mut profile_rng = self.rng(0);
        let mut sessions = SessionTasks::with_capacity(users as usize);
        for i in 0..users {
            let roll = profile_rng.gen_range(0.0..profile_weight);
            let profile = *UserProfile::pick(&config.user_profiles, roll).ok_or(Error::NoUserProfiles)?;

            let session = VirtualUserSession {
                id: u64::from(i),
                user_id: format!("user_{}_{i}", scenario.name),
                profile,
                behavior: scenario.user_behavior,
                duration: scenario.duration,
                rng: self.rng(u64::from(i) + 1),
                target: Arc::clone(&self.target),
                window: Arc::clone(&window),
                active: Arc::clone(&active),
            };
            sessions.spawn(session);

            if !stagger.is_zero() {
                tokio::time::sleep(stagger).await;
            }
        }

        enter(&mut phase, ScenarioPhase::Steady, &scenario.name);
        window.take_window();
        let sampling = Sampling {
            window: Arc::clone(&window),
            active: Arc::clone(&active),
            sampler: Arc::clone(&self.sampler),
            thresholds: config.thresholds,
            interval: config.sample_interval,
            scenario_started: started,
            last_sample: Instant::now(),
            samples: Vec::new(),
            bottlenecks: Vec::new(),
        };
        let (stop_tx, stop_rx) = oneshot::channel();
        let sampler_task = tokio::spawn(sampling.run(stop_rx));
        tokio::time::sleep(scenario.duration).await;
        let _ = stop_tx.send(());
        let mut sampling = sampler_task.await?;
        sampling.finish();

        enter(&mut phase, ScenarioPhase::RampingDown, &scenario.name);
        ramp_down(&active, config.ramp_down, &scenario.name).await;

        let outcomes = sessions.join().await;
        enter(&mut phase, ScenarioPhase::Completed, &scenario.name);

        let result = aggregate_scenario(
            &scenario.name,
            users,
            started.elapsed(),
            outcomes,
            sampling.samples,
            sampling.bottlenecks,
            &config.thresholds,
        );
        info!(
            scenario = %result.name,
            success = result.success,
            requests = result.total_requests,
            throughput = result.throughput,
            error_rate = result.error_rate,
            p95_ms = result.response_times.p95,
            bottlenecks = result.bottlenecks.len(),
            "scenario finished"
        );
        Ok(result)
    }
}

/// Ends the sessions still registered in `active` one by one, spread evenly
/// over `over`. Returns how many were ended.
async fn ramp_down(active: &ActiveSessions, over: Duration, scenario: &str) -> usize {
    let mut remaining: Vec<_> = active
        .iter()
        .map(|e| (*e.key(), Arc::clone(e.value())))
        .collect();
    if remaining.is_empty() {
        return 0;
    }
    remaining.sort_by_key(|(id, _)| *id);

    let step = over / u32::try_from(remaining.len()).unwrap_or(u32::MAX);
    debug!(scenario, remaining = remaining.len(), ?step, "ramping down");
    for (_, handle) in &remaining {
        handle.deactivate();
        if !step.is_zero() {
            tokio::time::sleep(step).await;
        }
    }
    remaining.len()
}

/// Session tasks of one scenario. Dropping the set aborts the sessions still
/// running, so a cancelled scenario stops sending traffic.
struct SessionTasks {
    tasks: Vec<(String, ProfileKind, JoinHandle<SessionOutcome>)>,
}

impl SessionTasks {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            tasks: Vec::with_capacity(capacity),
        }
    }

    fn spawn<T: Target>(&mut self, session: VirtualUserSession<T>) {
        let user_id = session.user_id.clone();
        let profile = session.profile.kind;
        self.tasks.push((user_id, profile, tokio::spawn(session.run())));
    }

    /// Waits for every session in spawn order. A session that panicked is
    /// reported as a failed user instead of failing the scenario.
    async fn join(mut self) -> Vec<SessionOutcome> {
        let mut outcomes = Vec::with_capacity(self.tasks.len());
        for (user_id, profile, handle) in &mut self.tasks {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    let reason = if err.is_panic() {
                        format!("session panicked: {}", panic_message(err.into_panic()))
                    } else {
                        "session cancelled".to_string()
                    };
                    warn!(user = %user_id, %reason, "session ended abnormally");
                    outcomes.push(SessionOutcome::aborted(
                        std::mem::take(user_id),
                        *profile,
                        reason,
                    ));
                }
            }
        }
        outcomes
    }
}

impl Drop for SessionTasks {
    fn drop(&mut self) {
        for (_, _, handle) in &self.tasks {
            handle.abort();
        }
    }
}

fn enter(phase: &mut ScenarioPhase, next: ScenarioPhase, scenario: &str) {
    debug!(scenario, from = %phase, to = %next, "scenario phase");
    *phase = next;
}

/// Steady-state sampler: one snapshot per interval, checked for bottlenecks.
struct Sampling<S> {
    window: Arc<LiveWindow>,
    active: Arc<ActiveSessions>,
    sampler: Arc<S>,
    thresholds: Thresholds,
    interval: Duration,
    scenario_started: Instant,
    last_sample: Instant,
    samples: Vec<TimeSeriesSample>,
    bottlenecks: Vec<Bottleneck>,
}

impl<S: ResourceSampler> Sampling<S> {
    async fn run(mut self, mut stop: oneshot::Receiver<()>) -> Self {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = ticker.tick() => self.record(),
            }
        }
        self
    }

    /// Closes steady state with a sample of the trailing window unless that
    /// window is too short to mean anything.
    fn finish(&mut self) {
        if self.samples.is_empty() || self.last_sample.elapsed() >= self.interval / 2 {
            self.record();
        }
    }

    fn record(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_sample);
        self.last_sample = now;

        let window = self.window.take_window();
        let resources = self.sampler.sample();
        let sample = TimeSeriesSample {
            timestamp: Utc::now(),
            elapsed: now.duration_since(self.scenario_started),
            active_users: self.active.len(),
            requests_per_second: gauntlet_metrics::per_sec(window.requests, dt.as_secs_f64()),
            average_response_time_ms: window.mean_latency_ms,
            error_rate: window.error_rate(),
            cpu_usage: resources.cpu_percent,
            memory_usage: resources.memory_percent,
        };

        let found = detect_bottlenecks(&sample, &self.thresholds);
        for b in &found {
            debug!(kind = %b.kind, severity = %b.severity, "{}", b.description);
        }
        self.bottlenecks.extend(found);
        self.samples.push(sample);
    }
}

/// Holds the report of a load test run as a unit.
#[derive(Debug, Default)]
pub struct ReportSlot(Mutex<Option<LoadTestReport>>);

impl ReportSlot {
    pub fn take(&self) -> Option<LoadTestReport> {
        self.0.lock().take()
    }

    fn store(&self, report: LoadTestReport) {
        *self.0.lock() = Some(report);
    }
}

impl<T: Target, S: ResourceSampler> LoadEngine<T, S> {
    /// Wraps the engine as an orchestrator unit that runs the whole load test
    /// and succeeds when the report does. The latest report lands in the
    /// returned slot.
    pub fn into_unit(self, name: impl Into<String>) -> (UnitDescriptor, Arc<ReportSlot>) {
        let name = name.into();
        let engine = Arc::new(self);
        let slot = Arc::new(ReportSlot::default());

        let unit_slot = Arc::clone(&slot);
        let unit_name = name.clone();
        let unit = UnitDescriptor::new(name, move || {
            let engine = Arc::clone(&engine);
            let slot = Arc::clone(&unit_slot);
            let name = unit_name.clone();
            async move {
                let report = engine
                    .run()
                    .await
                    .map_err(|err| UnitError::failed(err.to_string()))?;
                let success = report.success;
                let failed: Vec<String> = report
                    .scenarios
                    .iter()
                    .filter(|s| !s.success)
                    .map(|s| s.name.clone())
                    .collect();
                let overall = report.scores.overall;
                slot.store(report);

                if success {
                    Ok(())
                } else if failed.is_empty() {
                    Err(UnitError::failed(format!(
                        "load test `{name}` missed its targets (overall score {overall:.1})"
                    )))
                } else {
                    Err(UnitError::failed(format!(
                        "load test `{name}` failed scenarios: {}",
                        failed.join(", ")
                    )))
                }
            }
        });
        (unit, slot)
    }
}
