pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    CircularDependency,
    ResourceInsufficient,
    Runtime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ResourceKind {
    Cpu,
    Memory,
    Network,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid target url `{url}`: {reason}")]
    InvalidTargetUrl { url: String, reason: String },

    #[error("scenario `{scenario}`: `concurrent_users` must be within 1..=1000 (got {users})")]
    InvalidConcurrentUsers { scenario: String, users: u32 },

    #[error("scenario `{0}`: `duration` must be positive")]
    InvalidScenarioDuration(String),

    #[error(
        "scenario `{scenario}`: behavior weights must be non-negative and sum to at most 100 (got {total})"
    )]
    InvalidBehaviorWeights { scenario: String, total: f64 },

    #[error("no enabled scenarios configured")]
    NoScenarios,

    #[error("no units registered")]
    NoUnits,

    #[error("at least one user profile with a positive weight is required")]
    NoUserProfiles,

    #[error("invalid threshold `{name}`: {reason}")]
    InvalidThreshold { name: &'static str, reason: String },

    #[error("unit `{0}` is already registered")]
    DuplicateUnit(String),

    #[error("unit `{unit}` depends on unknown unit `{dependency}`")]
    UnknownDependency { unit: String, dependency: String },

    #[error(
        "unknown strategy `{0}` (expected `sequential`, `parallel`, `optimized`, or `dependency-aware`)"
    )]
    UnknownStrategy(String),

    #[error("circular dependency detected at `{unit}`: {}", .path.join(" -> "))]
    CircularDependency { unit: String, path: Vec<String> },

    #[error("insufficient {resource}: units require {required}, budget allows {available}")]
    ResourceInsufficient {
        resource: ResourceKind,
        required: f64,
        available: f64,
    },

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CircularDependency { .. } => ErrorKind::CircularDependency,
            Self::ResourceInsufficient { .. } => ErrorKind::ResourceInsufficient,
            Self::Join(_) => ErrorKind::Runtime,
            _ => ErrorKind::Configuration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_errors() {
        assert_eq!(Error::NoUnits.kind(), ErrorKind::Configuration);
        assert_eq!(
            Error::UnknownStrategy("fastest".into()).kind(),
            ErrorKind::Configuration
        );
        let cycle = Error::CircularDependency {
            unit: "a".into(),
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(cycle.kind(), ErrorKind::CircularDependency);
        assert_eq!(
            cycle.to_string(),
            "circular dependency detected at `a`: a -> b -> a"
        );
    }
}
