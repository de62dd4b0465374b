use std::time::Duration;

use super::action::ActionKind;
use crate::{Error, Result};

pub const MAX_CONCURRENT_USERS: u32 = 1000;

/// Action mix of a scenario, in percent. Whatever the three weights leave
/// below 100 is the idle share.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserBehavior {
    pub login_weight: f64,
    pub chat_weight: f64,
    pub search_weight: f64,
    /// Pause after every iteration of the session loop.
    pub idle_time: Duration,
}

impl UserBehavior {
    pub fn new(login_weight: f64, chat_weight: f64, search_weight: f64, idle_time: Duration) -> Self {
        Self {
            login_weight,
            chat_weight,
            search_weight,
            idle_time,
        }
    }

    fn total_weight(&self) -> f64 {
        self.login_weight + self.chat_weight + self.search_weight
    }

    /// Cumulative-threshold pick for a roll in `[0, 100)`: chat, then search,
    /// then login, otherwise idle.
    pub fn choose(&self, roll: f64) -> ActionKind {
        let mut cumulative = self.chat_weight;
        if roll < cumulative {
            return ActionKind::Chat;
        }
        cumulative += self.search_weight;
        if roll < cumulative {
            return ActionKind::Search;
        }
        cumulative += self.login_weight;
        if roll < cumulative {
            return ActionKind::Login;
        }
        ActionKind::Idle
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadScenario {
    pub name: String,
    pub concurrent_users: u32,
    pub duration: Duration,
    pub user_behavior: UserBehavior,
    pub enabled: bool,
}

impl LoadScenario {
    pub fn new(
        name: impl Into<String>,
        concurrent_users: u32,
        duration: Duration,
        user_behavior: UserBehavior,
    ) -> Self {
        Self {
            name: name.into(),
            concurrent_users,
            duration,
            user_behavior,
            enabled: true,
        }
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Light, medium, heavy and peak load.
    pub fn defaults() -> Vec<Self> {
        let secs = Duration::from_secs;
        vec![
            Self::new("light", 25, secs(300), UserBehavior::new(10.0, 60.0, 20.0, secs(5))),
            Self::new("medium", 50, secs(300), UserBehavior::new(15.0, 50.0, 25.0, secs(3))),
            Self::new("heavy", 100, secs(300), UserBehavior::new(20.0, 40.0, 30.0, secs(2))),
            Self::new("peak", 150, secs(180), UserBehavior::new(25.0, 35.0, 35.0, secs(1))),
        ]
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_CONCURRENT_USERS).contains(&self.concurrent_users) {
            return Err(Error::InvalidConcurrentUsers {
                scenario: self.name.clone(),
                users: self.concurrent_users,
            });
        }
        if self.duration.is_zero() {
            return Err(Error::InvalidScenarioDuration(self.name.clone()));
        }
        let b = &self.user_behavior;
        let total = b.total_weight();
        let weights_ok = [b.login_weight, b.chat_weight, b.search_weight]
            .iter()
            .all(|w| w.is_finite() && *w >= 0.0);
        if !weights_ok || total > 100.0 {
            return Err(Error::InvalidBehaviorWeights {
                scenario: self.name.clone(),
                total,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ProfileKind {
    Light,
    Moderate,
    Heavy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum QueryComplexity {
    Simple,
    Standard,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserProfile {
    pub kind: ProfileKind,
    pub weight: f64,
    pub query_complexity: QueryComplexity,
}

impl UserProfile {
    pub fn new(kind: ProfileKind, weight: f64, query_complexity: QueryComplexity) -> Self {
        Self {
            kind,
            weight,
            query_complexity,
        }
    }

    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new(ProfileKind::Light, 40.0, QueryComplexity::Simple),
            Self::new(ProfileKind::Moderate, 40.0, QueryComplexity::Standard),
            Self::new(ProfileKind::Heavy, 20.0, QueryComplexity::Complex),
        ]
    }

    /// Cumulative-weight pick; `roll` is in `[0, total weight)`.
    pub(crate) fn pick(profiles: &[Self], roll: f64) -> Option<&Self> {
        let mut cumulative = 0.0;
        for profile in profiles {
            cumulative += profile.weight;
            if roll < cumulative {
                return Some(profile);
            }
        }
        profiles.first()
    }
}

/// Pass/fail limits for scenarios and for the whole report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub max_response_time_ms: f64,
    /// Percent.
    pub max_error_rate: f64,
    /// Requests per second.
    pub min_throughput: f64,
    pub max_cpu_usage: f64,
    pub max_memory_usage: f64,
    pub overall_pass_score: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_response_time_ms: 2000.0,
            max_error_rate: 5.0,
            min_throughput: 10.0,
            max_cpu_usage: 80.0,
            max_memory_usage: 75.0,
            overall_pass_score: 85.0,
        }
    }
}

impl Thresholds {
    fn validate(&self) -> Result<()> {
        let positive = [
            ("max_response_time_ms", self.max_response_time_ms),
            ("min_throughput", self.min_throughput),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidThreshold {
                    name,
                    reason: format!("must be a positive number (got {value})"),
                });
            }
        }
        let percents = [
            ("max_error_rate", self.max_error_rate),
            ("max_cpu_usage", self.max_cpu_usage),
            ("max_memory_usage", self.max_memory_usage),
            ("overall_pass_score", self.overall_pass_score),
        ];
        for (name, value) in percents {
            if !(0.0..=100.0).contains(&value) {
                return Err(Error::InvalidThreshold {
                    name,
                    reason: format!("must be within 0..=100 (got {value})"),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadTestConfig {
    pub base_url: String,
    pub scenarios: Vec<LoadScenario>,
    pub user_profiles: Vec<UserProfile>,
    pub ramp_up: Duration,
    pub ramp_down: Duration,
    pub sample_interval: Duration,
    /// Pause between consecutive scenarios.
    pub scenario_pause: Duration,
    pub thresholds: Thresholds,
    /// Seeds every random draw of a run when set.
    pub seed: Option<u64>,
}

impl LoadTestConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            scenarios: LoadScenario::defaults(),
            user_profiles: UserProfile::defaults(),
            ramp_up: Duration::from_secs(60),
            ramp_down: Duration::from_secs(30),
            sample_interval: Duration::from_secs(5),
            scenario_pause: Duration::from_secs(5),
            thresholds: Thresholds::default(),
            seed: None,
        }
    }

    #[must_use]
    pub fn with_scenarios(mut self, scenarios: Vec<LoadScenario>) -> Self {
        self.scenarios = scenarios;
        self
    }

    #[must_use]
    pub fn with_user_profiles(mut self, profiles: Vec<UserProfile>) -> Self {
        self.user_profiles = profiles;
        self
    }

    #[must_use]
    pub fn with_ramp(mut self, ramp_up: Duration, ramp_down: Duration) -> Self {
        self.ramp_up = ramp_up;
        self.ramp_down = ramp_down;
        self
    }

    #[must_use]
    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    #[must_use]
    pub fn with_scenario_pause(mut self, pause: Duration) -> Self {
        self.scenario_pause = pause;
        self
    }

    #[must_use]
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn enabled_scenarios(&self) -> impl Iterator<Item = &LoadScenario> {
        self.scenarios.iter().filter(|s| s.enabled)
    }

    pub fn validate(&self) -> Result<()> {
        validate_base_url(&self.base_url)?;

        if self.enabled_scenarios().next().is_none() {
            return Err(Error::NoScenarios);
        }
        for scenario in self.enabled_scenarios() {
            scenario.validate()?;
        }

        let weights_ok = self
            .user_profiles
            .iter()
            .all(|p| p.weight.is_finite() && p.weight >= 0.0);
        let total: f64 = self.user_profiles.iter().map(|p| p.weight).sum();
        if !weights_ok || total <= 0.0 {
            return Err(Error::NoUserProfiles);
        }

        if self.sample_interval.is_zero() {
            return Err(Error::InvalidThreshold {
                name: "sample_interval",
                reason: "must be positive".to_string(),
            });
        }

        self.thresholds.validate()
    }
}

pub(crate) fn validate_base_url(base_url: &str) -> Result<url::Url> {
    let invalid = |reason: String| Error::InvalidTargetUrl {
        url: base_url.to_string(),
        reason,
    };
    let parsed = url::Url::parse(base_url).map_err(|err| invalid(err.to_string()))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(invalid(format!("unsupported scheme `{}`", parsed.scheme())));
    }
    if parsed.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn scenario(users: u32) -> LoadScenario {
        LoadScenario::new(
            "s",
            users,
            Duration::from_secs(10),
            UserBehavior::new(10.0, 60.0, 20.0, Duration::from_secs(1)),
        )
    }

    #[test]
    fn choose_uses_cumulative_thresholds() {
        let b = UserBehavior::new(10.0, 60.0, 20.0, Duration::ZERO);
        assert_eq!(b.choose(0.0), ActionKind::Chat);
        assert_eq!(b.choose(59.9), ActionKind::Chat);
        assert_eq!(b.choose(60.0), ActionKind::Search);
        assert_eq!(b.choose(85.0), ActionKind::Login);
        assert_eq!(b.choose(90.0), ActionKind::Idle);
        assert_eq!(b.choose(99.9), ActionKind::Idle);
    }

    #[test]
    fn profile_pick_follows_weights() {
        let profiles = UserProfile::defaults();
        assert_eq!(UserProfile::pick(&profiles, 10.0).unwrap().kind, ProfileKind::Light);
        assert_eq!(UserProfile::pick(&profiles, 40.0).unwrap().kind, ProfileKind::Moderate);
        assert_eq!(UserProfile::pick(&profiles, 95.0).unwrap().kind, ProfileKind::Heavy);
        assert!(UserProfile::pick(&[], 1.0).is_none());
    }

    #[test]
    fn concurrency_bounds_are_enforced() {
        assert!(scenario(1).validate().is_ok());
        assert!(scenario(1000).validate().is_ok());
        for users in [0, 1001] {
            assert!(matches!(
                scenario(users).validate(),
                Err(Error::InvalidConcurrentUsers { users: u, .. }) if u == users
            ));
        }
    }

    #[test]
    fn overweight_behavior_is_rejected() {
        let mut s = scenario(5);
        s.user_behavior.chat_weight = 95.0;
        assert!(matches!(
            s.validate(),
            Err(Error::InvalidBehaviorWeights { .. })
        ));
    }

    #[test]
    fn config_validation() {
        let config = LoadTestConfig::new("http://localhost:3000");
        assert!(config.validate().is_ok());

        let bad_url = LoadTestConfig::new("localhost:3000/api");
        assert!(matches!(
            bad_url.validate(),
            Err(Error::InvalidTargetUrl { .. })
        ));

        let ftp = LoadTestConfig::new("ftp://localhost");
        assert!(matches!(ftp.validate(), Err(Error::InvalidTargetUrl { .. })));

        let none_enabled = LoadTestConfig::new("http://localhost")
            .with_scenarios(vec![scenario(5).disabled()]);
        assert!(matches!(none_enabled.validate(), Err(Error::NoScenarios)));

        let no_profiles = LoadTestConfig::new("http://localhost").with_user_profiles(Vec::new());
        assert!(matches!(no_profiles.validate(), Err(Error::NoUserProfiles)));

        let thresholds = Thresholds {
            min_throughput: 0.0,
            ..Thresholds::default()
        };
        let zero_throughput = LoadTestConfig::new("http://localhost").with_thresholds(thresholds);
        assert!(matches!(
            zero_throughput.validate(),
            Err(Error::InvalidThreshold { name: "min_throughput", .. })
        ));
    }

    #[test]
    fn default_scenarios_are_valid() {
        for s in LoadScenario::defaults() {
            s.validate().unwrap();
        }
    }
}
