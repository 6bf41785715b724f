//! Reqwest-backed source for the remote limits document.
//!
//! The endpoint may answer with the document itself, `null`, or a content
//! API envelope `{"result": <document or null>}`. Any of those decode to an
//! optional [`UsageLimitsDocument`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;

use crate::domain::UsageLimitsDocument;
use crate::domain::ports::{UsageLimitsSource, UsageLimitsSourceError};

const USER_AGENT: &str = concat!("chat-usage/", env!("CARGO_PKG_VERSION"));

/// Limits source that issues one GET per fetch.
pub struct HttpUsageLimitsSource {
    client: Client,
    endpoint: Url,
}

impl HttpUsageLimitsSource {
    /// Build a source with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl UsageLimitsSource for HttpUsageLimitsSource {
    async fn fetch_limits(&self) -> Result<Option<UsageLimitsDocument>, UsageLimitsSourceError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        parse_document(body.as_ref())
    }
}

fn parse_document(body: &[u8]) -> Result<Option<UsageLimitsDocument>, UsageLimitsSourceError> {
    let value: Value = serde_json::from_slice(body).map_err(|error| {
        UsageLimitsSourceError::decode(format!("invalid limits JSON payload: {error}"))
    })?;
    let decoded = match value {
        Value::Null => return Ok(None),
        Value::Object(mut map) => match map.remove("result") {
            Some(result) => serde_json::from_value::<Option<UsageLimitsDocument>>(result),
            None => serde_json::from_value::<UsageLimitsDocument>(Value::Object(map)).map(Some),
        },
        other => {
            return Err(UsageLimitsSourceError::decode(format!(
                "limits payload must be an object, got {}",
                kind_of(&other)
            )));
        }
    };
    decoded.map_err(|error| UsageLimitsSourceError::decode(error.to_string()))
}

const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn map_transport_error(error: reqwest::Error) -> UsageLimitsSourceError {
    UsageLimitsSourceError::transport(error.to_string())
}

fn map_status_error(status: StatusCode, body: &[u8]) -> UsageLimitsSourceError {
    UsageLimitsSourceError::status(status.as_u16(), body_preview(body))
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 120;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}
