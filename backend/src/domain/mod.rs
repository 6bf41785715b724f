//! Domain primitives and use cases for chat usage metering.
//!
//! Purpose: derive a metering subject for each visitor, resolve the daily
//! limits for its tier, and gate chat sessions and messages against a
//! durable usage store. Nothing here touches HTTP or SQL directly; adapters
//! live under `inbound` and `outbound` and meet the domain through `ports`.
//!
//! Public surface:
//! - Error / ErrorCode: transport-agnostic error payload.
//! - IdentityResolver / VisitorIdentity: subject derivation.
//! - AuthHandoffVerifier: checks signed sign-in assertions.
//! - UsageLimits / UsageLimitsConfig: tier presets and remote overrides.
//! - UsageStatus / UsageStatusResponse: derived quota state and its projection.
//! - enforce_session_usage: the single choke point for new chat sessions.
//! - UsageService: implementation of the driving ports.

pub mod auth_handoff;
pub mod build_mode;
pub mod error;
pub mod identity;
pub mod limits;
pub mod limits_resolver;
pub mod ports;
pub mod session_gate;
pub mod usage;
pub mod usage_service;
pub mod usage_status;

pub use self::auth_handoff::{
    AUTH_HANDOFF_SECRET_ENV, AuthHandoff, AuthHandoffConfigError, AuthHandoffError,
    AuthHandoffVerifier,
};
pub use self::build_mode::BuildMode;
pub use self::error::{Error, ErrorCode};
pub use self::identity::{
    IdentityConfigError, IdentityResolver, USAGE_SALT_ENV, UsageSalt, VisitorIdentity,
    VisitorSignals, VisitorTier, hash_visitor_fingerprint, resolve_client_ip,
};
pub use self::limits::{
    AUTH_LIMITS, FREE_LIMITS, UsageLimits, UsageLimitsConfig, UsageLimitsDocument,
    normalize_usage_limits, select_usage_limits,
};
pub use self::limits_resolver::{DEFAULT_LIMITS_TTL, UsageLimitsResolver};
pub use self::session_gate::{
    ChatSessionPayload, SessionGateError, UPSTREAM_FAILURE_LOG, UpstreamFailure, UpstreamResponse,
    UpstreamSessionError, UsageLimitDetails, UsageLimitError, WorkflowRef, assert_client_secret,
    build_session_payload, enforce_message_usage, enforce_session_usage, ensure_session_ok,
    log_upstream_failure, map_usage_limit_error, parse_client_secret,
};
pub use self::usage::{
    DayWindow, RecordOutcome, UnknownUsageKind, UsageCaps, UsageCounts, UsageKind, UsageStatus,
    create_unlimited_usage_status,
};
pub use self::usage_service::{
    CHATKIT_WORKFLOW_ID_ENV, ChatProviderSettings, OPENAI_API_KEY_ENV, UsageService,
};
pub use self::usage_status::{
    UsageStatusInput, UsageStatusResponse, build_usage_status_response, normalize_usage_status,
};

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use actix_web::HttpResponse;
/// use chat_usage::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<HttpResponse> {
///     Err(Error::service_unavailable("Missing OPENAI_API_KEY"))
/// }
/// ```
pub type ApiResult<T> = Result<T, Error>;
