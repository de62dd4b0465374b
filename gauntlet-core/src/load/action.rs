use std::time::Duration;

use rand::Rng;

use super::config::QueryComplexity;

/// Upper bound on the length of a chat message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 1000;

const CHAT_TIMEOUT: Duration = Duration::from_secs(30);
const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ActionKind {
    Chat,
    Search,
    Login,
    Idle,
}

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    Http(#[from] gauntlet_http::Error),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("action timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One request a virtual user sends to the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRequest {
    Chat {
        user_id: String,
        session_id: String,
        message: String,
    },
    Search {
        user_id: String,
        query: String,
    },
    Login {
        user_id: String,
    },
}

impl ActionRequest {
    /// Builds a chat request; the message is trimmed and must be non-empty
    /// and at most [`MAX_MESSAGE_CHARS`] long.
    pub fn chat(user_id: &str, message: &str) -> Result<Self, ActionError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ActionError::InvalidInput("chat message is empty".to_string()));
        }
        let chars = message.chars().count();
        if chars > MAX_MESSAGE_CHARS {
            return Err(ActionError::InvalidInput(format!(
                "chat message is {chars} characters long (max {MAX_MESSAGE_CHARS})"
            )));
        }
        Ok(Self::Chat {
            user_id: user_id.to_string(),
            session_id: format!("session_{user_id}"),
            message: message.to_string(),
        })
    }

    pub fn search(user_id: &str, query: &str) -> Self {
        Self::Search {
            user_id: user_id.to_string(),
            query: query.to_string(),
        }
    }

    pub fn login(user_id: &str) -> Self {
        Self::Login {
            user_id: user_id.to_string(),
        }
    }

    /// Draws a request of `kind` with content matching `complexity`.
    /// Returns `None` for [`ActionKind::Idle`].
    pub fn generate<R: Rng>(
        kind: ActionKind,
        user_id: &str,
        complexity: QueryComplexity,
        rng: &mut R,
    ) -> Option<Result<Self, ActionError>> {
        match kind {
            ActionKind::Chat => Some(Self::chat(user_id, pick(chat_messages(complexity), rng))),
            ActionKind::Search => Some(Ok(Self::search(user_id, pick(SEARCH_TERMS, rng)))),
            ActionKind::Login => Some(Ok(Self::login(user_id))),
            ActionKind::Idle => None,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Chat { .. } => ActionKind::Chat,
            Self::Search { .. } => ActionKind::Search,
            Self::Login { .. } => ActionKind::Login,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        match self {
            Self::Chat { .. } => Some(CHAT_TIMEOUT),
            Self::Search { .. } => Some(SEARCH_TIMEOUT),
            Self::Login { .. } => None,
        }
    }
}

fn pick<'a, R: Rng>(pool: &[&'a str], rng: &mut R) -> &'a str {
    pool[rng.gen_range(0..pool.len())]
}

fn chat_messages(complexity: QueryComplexity) -> &'static [&'static str] {
    match complexity {
        QueryComplexity::Simple => &[
            "What are your opening hours?",
            "How do I reset my password?",
            "Where can I find the pricing page?",
            "Is there a free trial?",
        ],
        QueryComplexity::Standard => &[
            "Can you compare the standard and premium plans for a team of ten?",
            "Explain how the data export works and which formats are available.",
            "What happens to my files when a subscription expires?",
            "Summarize the security features relevant to a small business.",
        ],
        QueryComplexity::Complex => &[
            "Walk me through migrating an existing project with several thousand records, \
             including how to validate the result and roll back if something goes wrong.",
            "Draft a rollout plan for introducing the service across three departments, \
             covering training, access control and a review after the first month.",
            "Compare the trade-offs between the self-hosted and managed deployment options \
             for a workload with strict data residency requirements.",
        ],
    }
}

const SEARCH_TERMS: &[&str] = &[
    "getting started",
    "billing & invoices",
    "api rate limits",
    "export data",
    "two-factor authentication",
    "team permissions",
];

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn chat_message_is_trimmed_and_capped() {
        let req = ActionRequest::chat("user_1", "  hello  ").unwrap();
        assert_eq!(
            req,
            ActionRequest::Chat {
                user_id: "user_1".into(),
                session_id: "session_user_1".into(),
                message: "hello".into(),
            }
        );

        let at_limit = "x".repeat(MAX_MESSAGE_CHARS);
        assert!(ActionRequest::chat("u", &at_limit).is_ok());

        let too_long = "x".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(matches!(
            ActionRequest::chat("u", &too_long),
            Err(ActionError::InvalidInput(_))
        ));
        assert!(matches!(
            ActionRequest::chat("u", "   "),
            Err(ActionError::InvalidInput(_))
        ));
    }

    #[test]
    fn timeouts_per_action() {
        assert_eq!(
            ActionRequest::chat("u", "hi").unwrap().timeout(),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            ActionRequest::search("u", "q").timeout(),
            Some(Duration::from_secs(15))
        );
        assert_eq!(ActionRequest::login("u").timeout(), None);
    }

    #[test]
    fn generated_requests_match_kind() {
        let mut rng = StdRng::seed_from_u64(7);
        for kind in [ActionKind::Chat, ActionKind::Search, ActionKind::Login] {
            for complexity in [
                QueryComplexity::Simple,
                QueryComplexity::Standard,
                QueryComplexity::Complex,
            ] {
                let req = ActionRequest::generate(kind, "u", complexity, &mut rng)
                    .unwrap()
                    .unwrap();
                assert_eq!(req.kind(), kind);
            }
        }
        assert!(
            ActionRequest::generate(ActionKind::Idle, "u", QueryComplexity::Simple, &mut rng)
                .is_none()
        );
    }
}
