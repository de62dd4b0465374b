use std::future::Future;

use bytes::Bytes;
use gauntlet_http::{HttpClient, HttpRequest};
use serde_json::json;

use super::action::{ActionError, ActionRequest};
use super::config::validate_base_url;

const USER_AGENT: &str = concat!("gauntlet/", env!("CARGO_PKG_VERSION"));
const LOGIN_PASSWORD: &str = "load-test-password";

/// The service under test.
///
/// Implementations report transport errors and non-2xx responses as
/// [`ActionError`]; the engine applies per-action timeouts around the call.
pub trait Target: Send + Sync + 'static {
    fn perform(&self, request: ActionRequest)
    -> impl Future<Output = Result<(), ActionError>> + Send;
}

/// Target speaking the chat/search/login HTTP API.
#[derive(Debug, Clone)]
pub struct HttpTarget {
    client: HttpClient,
    base_url: String,
}

impl HttpTarget {
    pub fn new(base_url: &str) -> crate::Result<Self> {
        validate_base_url(base_url)?;
        Ok(Self {
            client: HttpClient::default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn build(&self, request: &ActionRequest) -> Result<HttpRequest, ActionError> {
        let req = match request {
            ActionRequest::Chat {
                user_id,
                session_id,
                message,
            } => {
                let body = serde_json::to_vec(&json!({
                    "message": message,
                    "userId": user_id,
                    "sessionId": session_id,
                }))?;
                HttpRequest::post_json(self.endpoint("/api/chat"), Bytes::from(body))
            }
            ActionRequest::Search { user_id, query } => {
                let mut url = url::Url::parse(&self.endpoint("/api/search"))
                    .map_err(|err| ActionError::InvalidInput(err.to_string()))?;
                url.query_pairs_mut()
                    .append_pair("q", query)
                    .append_pair("userId", user_id);
                HttpRequest::get(url.as_str())
            }
            ActionRequest::Login { user_id } => {
                let body = serde_json::to_vec(&json!({
                    "userId": user_id,
                    "password": LOGIN_PASSWORD,
                }))?;
                HttpRequest::post_json(self.endpoint("/api/auth/login"), Bytes::from(body))
            }
        };
        Ok(req.with_header("user-agent", USER_AGENT))
    }
}

impl Target for HttpTarget {
    async fn perform(&self, request: ActionRequest) -> Result<(), ActionError> {
        let req = self.build(&request)?;
        let res = self.client.request(req).await?;
        if !res.is_success() {
            return Err(ActionError::Status(res.status));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn search_query_is_percent_encoded() {
        let target = HttpTarget::new("http://127.0.0.1:3000/").unwrap();
        let req = target
            .build(&ActionRequest::search("user 1", "billing & invoices"))
            .unwrap();
        assert_eq!(req.method.as_str(), "GET");
        assert_eq!(
            req.url,
            "http://127.0.0.1:3000/api/search?q=billing+%26+invoices&userId=user+1"
        );
    }

    #[test]
    fn chat_body_is_json() {
        let target = HttpTarget::new("http://127.0.0.1:3000").unwrap();
        let req = target
            .build(&ActionRequest::chat("user_3", "hello").unwrap())
            .unwrap();
        assert_eq!(req.url, "http://127.0.0.1:3000/api/chat");
        let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
        assert_eq!(body["message"], "hello");
        assert_eq!(body["userId"], "user_3");
        assert_eq!(body["sessionId"], "session_user_3");
        assert!(
            req.headers
                .iter()
                .any(|(k, v)| k == "content-type" && v == "application/json")
        );
        assert!(req.headers.iter().any(|(k, _)| k == "user-agent"));
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(HttpTarget::new("not a url").is_err());
    }
}
