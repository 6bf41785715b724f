//! Reqwest-backed ChatKit session client.
//!
//! Transport only: the status line and body are handed back untouched so
//! the domain decides what counts as success.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::domain::ports::{ChatSessionProvider, ChatSessionProviderError};
use crate::domain::{ChatSessionPayload, UpstreamResponse};

/// Production session endpoint.
pub const DEFAULT_CHATKIT_SESSIONS_URL: &str = "https://api.openai.com/v1/chatkit/sessions";

const BETA_HEADER: &str = "OpenAI-Beta";
const BETA_VALUE: &str = "chatkit_beta=v1";

/// Session client that POSTs one JSON payload per request.
pub struct ChatKitHttpClient {
    client: Client,
    endpoint: Url,
}

impl ChatKitHttpClient {
    /// Build a client with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl ChatSessionProvider for ChatKitHttpClient {
    async fn create_session(
        &self,
        api_key: &str,
        payload: &ChatSessionPayload,
    ) -> Result<UpstreamResponse, ChatSessionProviderError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(api_key)
            .header(BETA_HEADER, BETA_VALUE)
            .json(payload)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_transport_error)?;
        Ok(UpstreamResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_owned(),
            body,
        })
    }
}

fn map_transport_error(error: reqwest::Error) -> ChatSessionProviderError {
    let message = if error.is_timeout() {
        format!("timed out: {error}")
    } else {
        error.to_string()
    };
    ChatSessionProviderError::transport(message)
}
