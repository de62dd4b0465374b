use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use gauntlet_core::load::{
    LoadScenario, ProfileKind, QueryComplexity, Thresholds, UserBehavior, UserProfile,
};
use gauntlet_core::orchestrator::{PhaseBudget, ResourceBudget, ResourceRequirement};
use serde::Deserialize;

/// Name of the implicit suite built from top-level `scenarios`.
pub(crate) const DEFAULT_SUITE: &str = "load";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct PlanYaml {
    /// Base URL shared by suites that don't set their own.
    pub target: Option<String>,
    pub strategy: Option<String>,
    pub seed: Option<u64>,

    #[serde(default)]
    pub ramp_up: Option<YamlDuration>,
    #[serde(default)]
    pub ramp_down: Option<YamlDuration>,
    #[serde(default)]
    pub sample_interval: Option<YamlDuration>,
    #[serde(default)]
    pub scenario_pause: Option<YamlDuration>,

    #[serde(default)]
    pub thresholds: ThresholdsYaml,
    #[serde(default)]
    pub user_profiles: Vec<UserProfileYaml>,
    #[serde(default)]
    pub sampler: SamplerYaml,

    #[serde(default)]
    pub budget: BudgetYaml,
    #[serde(default)]
    pub phase_budget: PhaseBudgetYaml,

    #[serde(default)]
    pub suites: Vec<SuiteYaml>,
    #[serde(default)]
    pub scenarios: Vec<ScenarioYaml>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct SuiteYaml {
    pub name: String,
    pub target: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub estimated_duration: Option<YamlDuration>,
    #[serde(default)]
    pub resources: ResourcesYaml,
    #[serde(default)]
    pub timeout: Option<YamlDuration>,
    #[serde(default)]
    pub retries: u32,
    pub scenarios: Vec<ScenarioYaml>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct ResourcesYaml {
    #[serde(default)]
    pub cpu: f64,
    #[serde(default)]
    pub memory: f64,
    #[serde(default)]
    pub network: f64,
    #[serde(default)]
    pub exclusive: bool,
}

impl ResourcesYaml {
    pub(crate) fn requirement(self) -> ResourceRequirement {
        let req = ResourceRequirement::new(self.cpu, self.memory, self.network);
        if self.exclusive { req.exclusive() } else { req }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct ScenarioYaml {
    pub name: String,
    pub users: u32,
    pub duration: YamlDuration,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub behavior: BehaviorYaml,
}

fn default_true() -> bool {
    true
}

impl ScenarioYaml {
    pub(crate) fn into_scenario(self) -> LoadScenario {
        let behavior = UserBehavior::new(
            self.behavior.login,
            self.behavior.chat,
            self.behavior.search,
            self.behavior.idle_time.into_inner(),
        );
        let scenario = LoadScenario::new(self.name, self.users, self.duration.into_inner(), behavior);
        if self.enabled {
            scenario
        } else {
            scenario.disabled()
        }
    }
}

/// Action weights in percent; whatever is left up to 100 is idle time.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct BehaviorYaml {
    #[serde(default)]
    pub login: f64,
    #[serde(default)]
    pub chat: f64,
    #[serde(default)]
    pub search: f64,
    #[serde(default = "default_idle_time")]
    pub idle_time: YamlDuration,
}

fn default_idle_time() -> YamlDuration {
    YamlDuration(Duration::from_secs(3))
}

impl Default for BehaviorYaml {
    fn default() -> Self {
        Self {
            login: 15.0,
            chat: 50.0,
            search: 25.0,
            idle_time: default_idle_time(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct ThresholdsYaml {
    pub max_response_time_ms: Option<f64>,
    pub max_error_rate: Option<f64>,
    pub min_throughput: Option<f64>,
    pub max_cpu_usage: Option<f64>,
    pub max_memory_usage: Option<f64>,
    pub overall_pass_score: Option<f64>,
}

impl ThresholdsYaml {
    pub(crate) fn resolve(self) -> Thresholds {
        let d = Thresholds::default();
        Thresholds {
            max_response_time_ms: self.max_response_time_ms.unwrap_or(d.max_response_time_ms),
            max_error_rate: self.max_error_rate.unwrap_or(d.max_error_rate),
            min_throughput: self.min_throughput.unwrap_or(d.min_throughput),
            max_cpu_usage: self.max_cpu_usage.unwrap_or(d.max_cpu_usage),
            max_memory_usage: self.max_memory_usage.unwrap_or(d.max_memory_usage),
            overall_pass_score: self.overall_pass_score.unwrap_or(d.overall_pass_score),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct UserProfileYaml {
    pub kind: String,
    pub weight: f64,
    pub query_complexity: String,
}

impl UserProfileYaml {
    fn into_profile(self) -> anyhow::Result<UserProfile> {
        let kind: ProfileKind = self.kind.parse().map_err(|_| {
            anyhow::anyhow!(
                "unknown user profile kind '{}' (expected light, moderate or heavy)",
                self.kind
            )
        })?;
        let complexity: QueryComplexity = self.query_complexity.parse().map_err(|_| {
            anyhow::anyhow!(
                "unknown query complexity '{}' (expected simple, standard or complex)",
                self.query_complexity
            )
        })?;
        Ok(UserProfile::new(kind, self.weight, complexity))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub(crate) enum SamplerYaml {
    #[default]
    Synthetic,
    Fixed { cpu: f64, memory: f64 },
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct BudgetYaml {
    pub cpu: Option<f64>,
    pub memory: Option<f64>,
    pub network: Option<f64>,
}

impl BudgetYaml {
    pub(crate) fn resolve(self) -> ResourceBudget {
        let d = ResourceBudget::default();
        ResourceBudget {
            cpu_percent: self.cpu.unwrap_or(d.cpu_percent),
            memory_mb: self.memory.unwrap_or(d.memory_mb),
            network_mbps: self.network.unwrap_or(d.network_mbps),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct PhaseBudgetYaml {
    pub cpu: Option<f64>,
    pub memory: Option<f64>,
}

impl PhaseBudgetYaml {
    pub(crate) fn resolve(self) -> PhaseBudget {
        let d = PhaseBudget::default();
        PhaseBudget {
            cpu_percent: self.cpu.unwrap_or(d.cpu_percent),
            memory_mb: self.memory.unwrap_or(d.memory_mb),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct YamlDuration(Duration);

impl YamlDuration {
    pub(crate) fn into_inner(self) -> Duration {
        self.0
    }
}

impl From<Duration> for YamlDuration {
    fn from(value: Duration) -> Self {
        Self(value)
    }
}

impl<'de> Deserialize<'de> for YamlDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl<'de> serde::de::Visitor<'de> for V {
            type Value = YamlDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as string (e.g. 10s), integer seconds, or float seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let secs = u64::try_from(v).map_err(|_| E::custom("duration cannot be negative"))?;
                Ok(YamlDuration(Duration::from_secs(secs)))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if !v.is_finite() || v < 0.0 {
                    return Err(E::custom("duration must be a non-negative, finite number"));
                }
                Ok(YamlDuration(Duration::from_secs_f64(v)))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let d = humantime::parse_duration(v.trim()).map_err(E::custom)?;
                Ok(YamlDuration(d))
            }

            fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                self.visit_str(&v)
            }
        }

        deserializer.deserialize_any(V)
    }
}

/// A plan with its suites normalized: top-level `scenarios` become the single
/// [`DEFAULT_SUITE`].
#[derive(Debug, Clone)]
pub(crate) struct Plan {
    pub doc: PlanYaml,
    pub suites: Vec<SuiteYaml>,
    pub user_profiles: Vec<UserProfile>,
}

pub(crate) fn parse_plan(text: &str) -> anyhow::Result<Plan> {
    let mut doc: PlanYaml = serde_yaml::from_str(text)?;

    let suites = match (doc.suites.is_empty(), doc.scenarios.is_empty()) {
        (false, true) => std::mem::take(&mut doc.suites),
        (true, false) => vec![SuiteYaml {
            name: DEFAULT_SUITE.to_string(),
            scenarios: std::mem::take(&mut doc.scenarios),
            ..SuiteYaml::default()
        }],
        (false, false) => anyhow::bail!("a plan lists either `suites` or `scenarios`, not both"),
        (true, true) => anyhow::bail!("plan has no suites or scenarios"),
    };

    let user_profiles = if doc.user_profiles.is_empty() {
        UserProfile::defaults()
    } else {
        std::mem::take(&mut doc.user_profiles)
            .into_iter()
            .map(UserProfileYaml::into_profile)
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    Ok(Plan {
        doc,
        suites,
        user_profiles,
    })
}

pub(crate) async fn load_plan(path: &Path) -> anyhow::Result<Plan> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read plan: {}", path.display()))?;
    parse_plan(&text).with_context(|| format!("invalid plan: {}", path.display()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn top_level_scenarios_become_default_suite() {
        let plan = parse_plan(
            r"
target: http://127.0.0.1:8080
rampUp: 10s
scenarios:
  - name: smoke
    users: 5
    duration: 30
    behavior: { chat: 100, idleTime: 250ms }
",
        )
        .unwrap();

        assert_eq!(plan.suites.len(), 1);
        let suite = &plan.suites[0];
        assert_eq!(suite.name, DEFAULT_SUITE);
        assert_eq!(suite.retries, 0);
        assert_eq!(plan.doc.ramp_up.unwrap().into_inner(), Duration::from_secs(10));
        assert_eq!(plan.user_profiles, UserProfile::defaults());

        let scenario = suite.scenarios[0].clone().into_scenario();
        assert_eq!(scenario.duration, Duration::from_secs(30));
        assert_eq!(scenario.user_behavior.chat_weight, 100.0);
        assert_eq!(scenario.user_behavior.login_weight, 0.0);
        assert_eq!(scenario.user_behavior.idle_time, Duration::from_millis(250));
        assert!(scenario.enabled);
    }

    #[test]
    fn suites_carry_unit_settings() {
        let plan = parse_plan(
            r"
strategy: dependency-aware
sampler: { kind: fixed, cpu: 20, memory: 30 }
budget: { cpu: 90 }
thresholds: { minThroughput: 2.5 }
userProfiles:
  - { kind: heavy, weight: 1, queryComplexity: complex }
suites:
  - name: warmup
    priority: 3
    resources: { cpu: 10, memory: 512, exclusive: true }
    scenarios:
      - { name: light, users: 2, duration: 5s }
  - name: stress
    dependsOn: [warmup]
    timeout: 2m
    retries: 1
    scenarios:
      - { name: heavy, users: 20, duration: 1m, enabled: false }
",
        )
        .unwrap();

        assert_eq!(plan.doc.strategy.as_deref(), Some("dependency-aware"));
        assert_eq!(plan.doc.sampler, SamplerYaml::Fixed { cpu: 20.0, memory: 30.0 });
        assert_eq!(plan.doc.budget.resolve().cpu_percent, 90.0);
        assert_eq!(plan.doc.budget.resolve().memory_mb, 8192.0);
        assert_eq!(plan.doc.thresholds.resolve().min_throughput, 2.5);
        assert_eq!(plan.doc.thresholds.resolve().max_error_rate, 5.0);
        assert_eq!(plan.user_profiles[0].kind, ProfileKind::Heavy);

        let warmup = &plan.suites[0];
        assert_eq!(warmup.priority, 3);
        assert!(!warmup.resources.requirement().concurrency_allowed);

        let stress = &plan.suites[1];
        assert_eq!(stress.depends_on, ["warmup"]);
        assert_eq!(stress.timeout.unwrap().into_inner(), Duration::from_secs(120));
        assert_eq!(stress.retries, 1);
        assert!(!stress.scenarios[0].clone().into_scenario().enabled);
    }

    #[test]
    fn rejects_ambiguous_or_empty_plans() {
        assert!(parse_plan("target: http://x\n").is_err());

        let both = r"
suites:
  - { name: a, scenarios: [{ name: s, users: 1, duration: 1s }] }
scenarios:
  - { name: s, users: 1, duration: 1s }
";
        assert!(parse_plan(both).is_err());
    }

    #[test]
    fn rejects_bad_values() {
        let negative = "scenarios: [{ name: s, users: 1, duration: -5 }]";
        assert!(parse_plan(negative).is_err());

        let unknown_field = "scenarios: [{ name: s, users: 1, duration: 1s, vus: 3 }]";
        assert!(parse_plan(unknown_field).is_err());

        let bad_profile = r"
userProfiles: [{ kind: extreme, weight: 1, queryComplexity: simple }]
scenarios: [{ name: s, users: 1, duration: 1s }]
";
        let err = parse_plan(bad_profile).unwrap_err();
        assert!(err.to_string().contains("extreme"), "{err}");
    }
}
