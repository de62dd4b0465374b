use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use gauntlet_metrics::{LiveWindow, RunningStats};
use rand::Rng;
use rand::rngs::StdRng;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::trace;

use super::action::{ActionError, ActionRequest};
use super::config::{UserBehavior, UserProfile};
use super::report::{SessionOutcome, UserMetrics};
use super::target::Target;

/// How long an idle draw pauses the session.
const IDLE_ACTION_PAUSE: Duration = Duration::from_secs(1);

/// Sessions currently running, keyed by session id. Each entry is inserted
/// and removed only by its own session.
pub(crate) type ActiveSessions = DashMap<u64, Arc<SessionHandle>>;

#[derive(Debug)]
pub(crate) struct SessionHandle {
    active: AtomicBool,
    stop: Notify,
}

impl SessionHandle {
    pub(crate) fn new() -> Self {
        Self {
            active: AtomicBool::new(true),
            stop: Notify::new(),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Ends the session after its in-flight action, if any.
    pub(crate) fn deactivate(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            self.stop.notify_one();
        }
    }

    /// Sleeps until `until`; returns false when the session was deactivated.
    async fn pause(&self, until: Instant) -> bool {
        if !self.is_active() {
            return false;
        }
        tokio::select! {
            () = tokio::time::sleep_until(until) => self.is_active(),
            () = self.stop.notified() => false,
        }
    }
}

/// Lists a session in [`ActiveSessions`] until dropped, so a session that
/// panics or is aborted does not linger there.
struct Registration {
    id: u64,
    active: Arc<ActiveSessions>,
}

impl Registration {
    fn new(id: u64, active: Arc<ActiveSessions>, handle: &Arc<SessionHandle>) -> Self {
        active.insert(id, Arc::clone(handle));
        Self { id, active }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.active.remove(&self.id);
    }
}

pub(crate) struct VirtualUserSession<T> {
    pub(crate) id: u64,
    pub(crate) user_id: String,
    pub(crate) profile: UserProfile,
    pub(crate) behavior: UserBehavior,
    pub(crate) duration: Duration,
    pub(crate) rng: StdRng,
    pub(crate) target: Arc<T>,
    pub(crate) window: Arc<LiveWindow>,
    pub(crate) active: Arc<ActiveSessions>,
}

impl<T: Target> VirtualUserSession<T> {
    /// Runs the action loop until the session's own deadline passes or it is
    /// deactivated. Action failures are recorded and the loop carries on.
    pub(crate) async fn run(mut self) -> SessionOutcome {
        let handle = Arc::new(SessionHandle::new());
        let registration = Registration::new(self.id, Arc::clone(&self.active), &handle);

        let started = Instant::now();
        let deadline = started + self.duration;

        let mut total_actions = 0u64;
        let mut latency = RunningStats::default();
        let mut response_times_ms = Vec::new();
        let mut errors = Vec::new();

        while handle.is_active() && Instant::now() < deadline {
            let kind = self.behavior.choose(self.rng.gen_range(0.0..100.0));
            let request = ActionRequest::generate(
                kind,
                &self.user_id,
                self.profile.query_complexity,
                &mut self.rng,
            );

            match request {
                None => {
                    let until = (Instant::now() + IDLE_ACTION_PAUSE).min(deadline);
                    if !handle.pause(until).await {
                        break;
                    }
                }
                Some(request) => {
                    total_actions += 1;
                    let action_started = Instant::now();
                    match self.perform(request).await {
                        Ok(()) => {
                            let elapsed = action_started.elapsed();
                            let ms = elapsed.as_secs_f64() * 1000.0;
                            latency.push(ms);
                            response_times_ms.push(ms);
                            self.window.record_success(elapsed);
                        }
                        Err(err) => {
                            trace!(user = %self.user_id, %kind, error = %err, "action failed");
                            errors.push(err.to_string());
                            self.window.record_failure();
                        }
                    }
                }
            }

            let until = (Instant::now() + self.behavior.idle_time).min(deadline);
            if !handle.pause(until).await {
                break;
            }
        }

        drop(registration);

        SessionOutcome {
            metrics: UserMetrics {
                user_id: self.user_id,
                profile: self.profile.kind,
                total_actions,
                successful_actions: latency.count(),
                average_response_time_ms: latency.mean(),
                session_duration: started.elapsed(),
                errors,
            },
            response_times_ms,
        }
    }

    async fn perform(
        &self,
        request: Result<ActionRequest, ActionError>,
    ) -> Result<(), ActionError> {
        let request = request?;
        match request.timeout() {
            Some(timeout) => tokio::time::timeout(timeout, self.target.perform(request))
                .await
                .map_err(|_| ActionError::Timeout(timeout))?,
            None => self.target.perform(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::config::{ProfileKind, QueryComplexity};
    use rand::SeedableRng;

    struct FlakyTarget;

    impl Target for FlakyTarget {
        async fn perform(&self, request: ActionRequest) -> Result<(), ActionError> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            match request {
                ActionRequest::Login { .. } => Err(ActionError::Status(503)),
                _ => Ok(()),
            }
        }
    }

    struct HangingTarget;

    impl Target for HangingTarget {
        async fn perform(&self, _request: ActionRequest) -> Result<(), ActionError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    fn session<T: Target>(target: T, behavior: UserBehavior) -> VirtualUserSession<T> {
        VirtualUserSession {
            id: 7,
            user_id: "user_test_7".to_string(),
            profile: UserProfile::new(ProfileKind::Moderate, 100.0, QueryComplexity::Standard),
            behavior,
            duration: Duration::from_secs(10),
            rng: StdRng::seed_from_u64(1),
            target: Arc::new(target),
            window: Arc::new(LiveWindow::new()),
            active: Arc::new(DashMap::new()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_recorded_and_the_loop_continues() {
        let behavior = UserBehavior::new(50.0, 50.0, 0.0, Duration::from_millis(900));
        let s = session(FlakyTarget, behavior);
        let active = Arc::clone(&s.active);
        let out = s.run().await;

        // 100ms action + 900ms pause, 10s deadline.
        assert_eq!(out.metrics.total_actions, 10);
        assert_eq!(
            out.metrics.errors.len() as u64,
            out.metrics.total_actions - out.metrics.successful_actions
        );
        assert!(out.metrics.errors.iter().all(|e| e == "unexpected status 503"));
        assert_eq!(
            out.response_times_ms.len() as u64,
            out.metrics.successful_actions
        );
        assert!(active.is_empty(), "session must remove itself");
    }

    #[tokio::test(start_paused = true)]
    async fn search_timeout_cancels_only_the_action() {
        let behavior = UserBehavior::new(0.0, 0.0, 100.0, Duration::ZERO);
        let mut s = session(HangingTarget, behavior);
        s.duration = Duration::from_secs(20);
        let out = s.run().await;

        // Two 15s timeouts fit before the 20s deadline stops the loop.
        assert_eq!(out.metrics.total_actions, 2);
        assert_eq!(out.metrics.successful_actions, 0);
        assert!(out.metrics.errors[0].contains("timed out after 15s"));
    }

    #[tokio::test(start_paused = true)]
    async fn deactivation_stops_an_idle_session() {
        let behavior = UserBehavior::new(0.0, 0.0, 0.0, Duration::from_secs(5));
        let mut s = session(FlakyTarget, behavior);
        s.duration = Duration::from_secs(3600);
        let active = Arc::clone(&s.active);
        let task = tokio::spawn(s.run());

        tokio::time::sleep(Duration::from_secs(2)).await;
        let handle = active.get(&7).map(|e| Arc::clone(e.value()));
        assert!(handle.is_some());
        if let Some(handle) = handle {
            handle.deactivate();
        }

        let out = match task.await {
            Ok(out) => out,
            Err(err) => panic!("session task failed: {err}"),
        };
        assert_eq!(out.metrics.total_actions, 0);
        assert!(out.metrics.session_duration < Duration::from_secs(10));
        assert!(active.is_empty());
    }
}
