//! Chat usage use cases.
//!
//! [`UsageService`] implements both driving ports. Each call resolves the
//! visitor's identity and limits, then defers to the session gate or the
//! store. Provider credentials are checked per call, so a missing key fails
//! session creation without taking the status endpoint down.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use mockable::Env;
use tracing::{error, info, warn};
use zeroize::Zeroizing;

use super::ports::{
    ChatSessionGrant, ChatSessionProvider, ChatUsageCommand, NoOpUsageMetrics, UsageDecision,
    UsageMetrics, UsageStatusQuery, UsageStore, UsageStoreError,
};
use super::{
    build_session_payload, build_usage_status_response, enforce_message_usage,
    enforce_session_usage, ensure_session_ok, log_upstream_failure, parse_client_secret, Error,
    IdentityResolver, SessionGateError, UsageCaps, UsageKind, UsageLimits, UsageLimitsResolver,
    UsageStatusResponse, VisitorIdentity, VisitorSignals,
};

/// Environment variable holding the upstream API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Environment variable holding the chat workflow identifier.
pub const CHATKIT_WORKFLOW_ID_ENV: &str = "CHATKIT_WORKFLOW_ID";

const UPSTREAM_FAILURE_MESSAGE: &str = "Failed to create session";

/// Upstream credentials. Either may be absent; session creation checks.
#[derive(Clone, Default)]
pub struct ChatProviderSettings {
    api_key: Option<Zeroizing<String>>,
    workflow_id: Option<String>,
}

impl ChatProviderSettings {
    /// Explicit settings.
    pub fn new(api_key: Option<String>, workflow_id: Option<String>) -> Self {
        Self {
            api_key: api_key.map(Zeroizing::new),
            workflow_id,
        }
    }

    /// Read `OPENAI_API_KEY` and `CHATKIT_WORKFLOW_ID`. Blank values are absent.
    pub fn from_env<E: Env>(env: &E) -> Self {
        let read = |name: &str| env.string(name).filter(|value| !value.trim().is_empty());
        Self::new(read(OPENAI_API_KEY_ENV), read(CHATKIT_WORKFLOW_ID_ENV))
    }

    fn require(&self) -> Result<(&str, &str), Error> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| missing(OPENAI_API_KEY_ENV))?;
        let workflow_id = self
            .workflow_id
            .as_deref()
            .ok_or_else(|| missing(CHATKIT_WORKFLOW_ID_ENV))?;
        Ok((api_key.as_str(), workflow_id))
    }
}

impl fmt::Debug for ChatProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatProviderSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("workflow_id", &self.workflow_id)
            .finish()
    }
}

fn missing(name: &str) -> Error {
    error!(variable = name, "chat provider configuration missing");
    Error::service_unavailable(format!("Missing {name}"))
}

/// Domain service behind the usage endpoints.
#[derive(Clone)]
pub struct UsageService {
    identity: Arc<IdentityResolver>,
    limits: Arc<UsageLimitsResolver>,
    store: Arc<dyn UsageStore>,
    provider: Arc<dyn ChatSessionProvider>,
    settings: ChatProviderSettings,
    metrics: Arc<dyn UsageMetrics>,
}

impl UsageService {
    /// Wire the service. Metrics default to a no-op recorder.
    pub fn new(
        identity: IdentityResolver,
        limits: Arc<UsageLimitsResolver>,
        store: Arc<dyn UsageStore>,
        provider: Arc<dyn ChatSessionProvider>,
        settings: ChatProviderSettings,
    ) -> Self {
        Self {
            identity: Arc::new(identity),
            limits,
            store,
            provider,
            settings,
            metrics: Arc::new(NoOpUsageMetrics),
        }
    }

    /// Attach a metrics recorder.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn UsageMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    async fn resolve(&self, signals: &VisitorSignals) -> (VisitorIdentity, UsageLimits) {
        let identity = self.identity.build_visitor_identity(signals);
        let limits = self.limits.resolve().await.for_tier(identity.tier());
        (identity, limits)
    }

    async fn gate(
        &self,
        identity: &VisitorIdentity,
        limits: &UsageLimits,
        kind: UsageKind,
    ) -> Result<(), Error> {
        let store = self.store.as_ref();
        let outcome = match kind {
            UsageKind::Session => enforce_session_usage(store, identity.subject(), limits).await,
            UsageKind::Message => enforce_message_usage(store, identity.subject(), limits).await,
        };
        match outcome {
            Ok(_) => {
                self.observe(kind, identity, UsageDecision::Admitted).await;
                Ok(())
            }
            Err(SessionGateError::UsageLimit(limit)) => {
                info!(
                    subject = identity.log_label(),
                    tier = ?identity.tier(),
                    %kind,
                    "usage limit reached"
                );
                self.observe(kind, identity, UsageDecision::Rejected).await;
                Err(limit.into())
            }
            Err(SessionGateError::Store(err)) => Err(map_store_error(err)),
        }
    }

    async fn observe(&self, kind: UsageKind, identity: &VisitorIdentity, decision: UsageDecision) {
        if let Err(err) = self
            .metrics
            .record_decision(kind, identity.tier(), decision)
            .await
        {
            warn!(error = %err, "failed to record usage metrics");
        }
    }

    async fn project(
        &self,
        identity: &VisitorIdentity,
        limits: &UsageLimits,
    ) -> Result<UsageStatusResponse, Error> {
        let status = self
            .store
            .get_status(identity.subject(), UsageCaps::from(limits))
            .await
            .map_err(map_store_error)?;
        Ok(build_usage_status_response(&status, limits))
    }
}

fn map_store_error(err: UsageStoreError) -> Error {
    error!(error = %err, "usage store failure");
    match err {
        UsageStoreError::Connection { .. } => Error::service_unavailable("usage store unavailable"),
        UsageStoreError::Query { .. } => Error::internal("usage store error"),
    }
}

#[async_trait]
impl UsageStatusQuery for UsageService {
    async fn usage_status(&self, signals: &VisitorSignals) -> Result<UsageStatusResponse, Error> {
        let (identity, limits) = self.resolve(signals).await;
        self.project(&identity, &limits).await
    }
}

#[async_trait]
impl ChatUsageCommand for UsageService {
    async fn create_session(&self, signals: &VisitorSignals) -> Result<ChatSessionGrant, Error> {
        let (api_key, workflow_id) = self.settings.require()?;
        let (identity, limits) = self.resolve(signals).await;
        self.gate(&identity, &limits, UsageKind::Session).await?;

        let payload = build_session_payload(workflow_id, &identity);
        let response = self
            .provider
            .create_session(api_key, &payload)
            .await
            .map_err(|err| {
                error!(error = %err, "chat session provider unreachable");
                Error::upstream_failure(UPSTREAM_FAILURE_MESSAGE)
            })?;
        let body = ensure_session_ok(response, log_upstream_failure)
            .map_err(|err| Error::upstream_failure(err.to_string()))?;
        let client_secret = parse_client_secret(&body).map_err(|err| {
            error!(error = %err, "chat session response malformed");
            Error::upstream_failure(err.to_string())
        })?;

        info!(
            subject = identity.log_label(),
            tier = ?identity.tier(),
            "chat session created"
        );
        Ok(ChatSessionGrant { client_secret })
    }

    async fn record_message(
        &self,
        signals: &VisitorSignals,
    ) -> Result<UsageStatusResponse, Error> {
        let (identity, limits) = self.resolve(signals).await;
        self.gate(&identity, &limits, UsageKind::Message).await?;
        self.project(&identity, &limits).await
    }
}
