//! Usage gate in front of chat sessions and messages.
//!
//! Every new chat session passes through [`enforce_session_usage`]. A blocked
//! subject gets a [`UsageLimitError`] that carries the status and limits the
//! UI needs to render a sign-in prompt. The helpers at the bottom wrap the
//! upstream session response so provider error bodies stay server-side.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::error;

use super::ports::{UsageStore, UsageStoreError};
use super::{
    Error, RecordOutcome, UsageCaps, UsageKind, UsageLimits, UsageStatus, VisitorIdentity,
};

/// Context attached to a usage-limit rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageLimitDetails {
    /// Subject that hit the cap.
    pub subject: String,
    /// Status observed when the request was rejected.
    pub status: UsageStatus,
    /// Limits the status was evaluated against.
    pub limits: UsageLimits,
}

/// A subject reached a daily cap.
///
/// Clients branch on [`UsageLimitError::CODE`], never on the message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Usage limit reached")]
pub struct UsageLimitError {
    details: UsageLimitDetails,
}

impl UsageLimitError {
    /// Stable marker for client-side branching.
    pub const CODE: &'static str = "USAGE_LIMIT";
    /// Error name exposed alongside the code.
    pub const NAME: &'static str = "UsageLimitError";

    /// Wrap rejection details.
    #[must_use]
    pub fn new(details: UsageLimitDetails) -> Self {
        Self { details }
    }

    /// Rejection details.
    #[must_use]
    pub fn details(&self) -> &UsageLimitDetails {
        &self.details
    }
}

/// Build a [`UsageLimitError`] from its parts.
#[must_use]
pub fn map_usage_limit_error(details: UsageLimitDetails) -> UsageLimitError {
    UsageLimitError::new(details)
}

impl From<UsageLimitError> for Error {
    fn from(err: UsageLimitError) -> Self {
        let message = err.to_string();
        let UsageLimitDetails {
            subject,
            status,
            limits,
        } = err.details;
        Error::usage_limit(message).with_details(json!({
            "name": UsageLimitError::NAME,
            "code": UsageLimitError::CODE,
            "subject": subject,
            "status": status,
            "limits": limits,
        }))
    }
}

/// Why the gate refused to admit a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionGateError {
    /// The subject is at its cap.
    #[error(transparent)]
    UsageLimit(#[from] UsageLimitError),
    /// The store failed; this is an operational fault, not throttling.
    #[error(transparent)]
    Store(#[from] UsageStoreError),
}

/// Admit a new chat session for `subject` or reject it.
///
/// Returns the status observed before the session was recorded. A record
/// request that loses a race to the cap is rejected as well, with the
/// refreshed status attached.
///
/// # Errors
///
/// [`SessionGateError::UsageLimit`] when the session cap is reached and
/// [`SessionGateError::Store`] when the store fails.
pub async fn enforce_session_usage(
    store: &dyn UsageStore,
    subject: &str,
    limits: &UsageLimits,
) -> Result<UsageStatus, SessionGateError> {
    enforce(store, subject, limits, UsageKind::Session).await
}

/// Account for one message from `subject` or reject it.
///
/// Only the message cap is consulted; a session-blocked subject may keep
/// messaging inside a session it already holds.
///
/// # Errors
///
/// As for [`enforce_session_usage`], with the message cap.
pub async fn enforce_message_usage(
    store: &dyn UsageStore,
    subject: &str,
    limits: &UsageLimits,
) -> Result<UsageStatus, SessionGateError> {
    enforce(store, subject, limits, UsageKind::Message).await
}

async fn enforce(
    store: &dyn UsageStore,
    subject: &str,
    limits: &UsageLimits,
    kind: UsageKind,
) -> Result<UsageStatus, SessionGateError> {
    let caps = UsageCaps::from(limits);
    let status = store.get_status(subject, caps).await?;
    if is_blocked(&status, kind) {
        return Err(rejection(subject, status, limits).into());
    }

    let outcome = match kind {
        UsageKind::Session => store.record_session(subject, caps).await?,
        UsageKind::Message => store.record_message(subject, caps).await?,
    };
    match outcome {
        RecordOutcome::Recorded => Ok(status),
        RecordOutcome::AtCap => {
            let latest = store.get_status(subject, caps).await?;
            Err(rejection(subject, latest, limits).into())
        }
    }
}

const fn is_blocked(status: &UsageStatus, kind: UsageKind) -> bool {
    match kind {
        UsageKind::Session => status.is_session_blocked,
        UsageKind::Message => status.is_message_blocked,
    }
}

fn rejection(subject: &str, status: UsageStatus, limits: &UsageLimits) -> UsageLimitError {
    map_usage_limit_error(UsageLimitDetails {
        subject: subject.to_owned(),
        status,
        limits: *limits,
    })
}

/// Workflow reference inside a session request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRef {
    /// Upstream workflow identifier.
    pub id: String,
}

/// Body of an upstream session request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSessionPayload {
    /// Workflow the session runs.
    pub workflow: WorkflowRef,
    /// Metering subject, forwarded as the upstream user id.
    pub user: String,
}

impl ChatSessionPayload {
    /// Payload for `workflow_id` on behalf of `user`.
    pub fn new(workflow_id: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            workflow: WorkflowRef {
                id: workflow_id.into(),
            },
            user: user.into(),
        }
    }
}

/// Map a workflow and identity to an upstream request body.
///
/// # Examples
///
/// ```rust
/// use chat_usage::domain::{build_session_payload, IdentityResolver, UsageSalt, VisitorSignals};
///
/// let resolver = IdentityResolver::new(UsageSalt::new("salt"));
/// let identity = resolver.build_visitor_identity(&VisitorSignals {
///     auth_user_id: Some("user_42".into()),
///     ..VisitorSignals::default()
/// });
/// let payload = build_session_payload("wf_1", &identity);
/// assert_eq!(payload.workflow.id, "wf_1");
/// assert_eq!(payload.user, "user_42");
/// ```
#[must_use]
pub fn build_session_payload(workflow_id: &str, identity: &VisitorIdentity) -> ChatSessionPayload {
    ChatSessionPayload::new(workflow_id, identity.subject())
}

/// Raw upstream reply: status line plus unparsed body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    /// HTTP status code.
    pub status: u16,
    /// Canonical reason phrase, possibly empty.
    pub status_text: String,
    /// Response body text.
    pub body: String,
}

impl UpstreamResponse {
    /// Whether the status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Fields logged when the upstream refuses a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamFailure {
    /// HTTP status returned by the provider.
    pub status: u16,
    /// Reason phrase reported alongside `status`.
    pub status_text: String,
    /// Raw response body from the provider.
    pub error: String,
}

/// Upstream session failures as seen by callers. Messages are generic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamSessionError {
    /// Non-2xx status.
    #[error("Failed to create session")]
    Rejected,
    /// 2xx status without a usable client secret.
    #[error("OpenAI session response missing client_secret")]
    MissingClientSecret,
}

/// Message logged for a refused upstream session request.
pub const UPSTREAM_FAILURE_LOG: &str = "OpenAI ChatKit session request failed";

/// Pass a successful response body through; log and reject anything else.
///
/// `log` receives the full upstream detail. The returned error never
/// carries the upstream body.
///
/// # Errors
///
/// [`UpstreamSessionError::Rejected`] for any non-2xx status.
pub fn ensure_session_ok<F>(
    response: UpstreamResponse,
    log: F,
) -> Result<String, UpstreamSessionError>
where
    F: FnOnce(&str, &UpstreamFailure),
{
    if response.is_success() {
        return Ok(response.body);
    }

    log(
        UPSTREAM_FAILURE_LOG,
        &UpstreamFailure {
            status: response.status,
            status_text: response.status_text,
            error: response.body,
        },
    );
    Err(UpstreamSessionError::Rejected)
}

/// Default logger for [`ensure_session_ok`].
pub fn log_upstream_failure(message: &str, failure: &UpstreamFailure) {
    error!(
        status = failure.status,
        status_text = %failure.status_text,
        error = %failure.error,
        "{message}"
    );
}

/// Extract `client_secret` from a decoded upstream body.
///
/// # Errors
///
/// [`UpstreamSessionError::MissingClientSecret`] unless `data` is an object
/// with a string `client_secret`.
pub fn assert_client_secret(data: &Value) -> Result<String, UpstreamSessionError> {
    data.get("client_secret")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or(UpstreamSessionError::MissingClientSecret)
}

/// Decode a raw body and extract its client secret.
///
/// # Errors
///
/// [`UpstreamSessionError::MissingClientSecret`] when the body is not JSON
/// or lacks a string `client_secret`.
pub fn parse_client_secret(body: &str) -> Result<String, UpstreamSessionError> {
    let data: Value =
        serde_json::from_str(body).map_err(|_| UpstreamSessionError::MissingClientSecret)?;
    assert_client_secret(&data)
}
