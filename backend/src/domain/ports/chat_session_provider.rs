//! Port for the upstream chat-session API.
//!
//! Adapters only move bytes: they return whatever status and body the
//! provider produced and leave success checks to
//! [`crate::domain::ensure_session_ok`] and
//! [`crate::domain::parse_client_secret`].

use async_trait::async_trait;
use serde_json::json;

use crate::domain::{ChatSessionPayload, UpstreamResponse};

use super::define_port_error;

define_port_error! {
    /// Errors raised before the provider produced any HTTP response.
    pub enum ChatSessionProviderError {
        /// Network failure, timeout, or TLS error.
        Transport { message: String } =>
            "chat session provider unreachable: {message}",
    }
}

/// Issues chat sessions with the upstream provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatSessionProvider: Send + Sync {
    /// Request a new session for `payload`, authenticating with `api_key`.
    async fn create_session(
        &self,
        api_key: &str,
        payload: &ChatSessionPayload,
    ) -> Result<UpstreamResponse, ChatSessionProviderError>;
}

/// Provider that answers every request with a fixed client secret.
#[derive(Debug, Clone)]
pub struct FixtureChatSessionProvider {
    client_secret: String,
}

impl FixtureChatSessionProvider {
    /// Serve `client_secret` for every session.
    pub fn new(client_secret: impl Into<String>) -> Self {
        Self {
            client_secret: client_secret.into(),
        }
    }
}

impl Default for FixtureChatSessionProvider {
    fn default() -> Self {
        Self::new("fixture-client-secret")
    }
}

#[async_trait]
impl ChatSessionProvider for FixtureChatSessionProvider {
    async fn create_session(
        &self,
        _api_key: &str,
        _payload: &ChatSessionPayload,
    ) -> Result<UpstreamResponse, ChatSessionProviderError> {
        Ok(UpstreamResponse {
            status: 200,
            status_text: "OK".to_owned(),
            body: json!({ "client_secret": self.client_secret }).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ensure_session_ok, parse_client_secret};

    #[tokio::test]
    async fn fixture_response_passes_upstream_checks() {
        let provider = FixtureChatSessionProvider::new("secret-1");
        let payload = ChatSessionPayload::new("wf_123", "subject");

        let response = provider
            .create_session("sk-test", &payload)
            .await
            .expect("fixture responds");
        let body = ensure_session_ok(response, |_, _| {}).expect("success status");

        assert_eq!(parse_client_secret(&body).expect("secret"), "secret-1");
    }
}
