//! Client-facing projection of a [`UsageStatus`].

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{UsageLimits, UsageStatus};

/// Remaining quota as shown to the chat UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageStatusResponse {
    /// Sessions left today, never negative.
    pub sessions_remaining: u32,
    /// Messages left today, never negative.
    pub messages_remaining: u32,
    /// Either cap is reached.
    pub is_limited: bool,
    /// Session cap is reached.
    pub is_session_blocked: bool,
    /// Message cap is reached.
    pub is_message_blocked: bool,
    /// Unix seconds at which the session block lifts.
    pub cooldown_ends_at: Option<i64>,
}

/// Raw inputs to [`normalize_usage_status`].
///
/// Remaining counts may be negative when limits were lowered mid-day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageStatusInput {
    /// Sessions left today; clamped at zero.
    pub sessions_remaining: i64,
    /// Messages left today; clamped at zero.
    pub messages_remaining: i64,
    /// Explicit session block. `None` derives it from `sessions_remaining`.
    pub is_session_blocked: Option<bool>,
    /// Explicit message block. `None` derives it from `messages_remaining`.
    pub is_message_blocked: Option<bool>,
    /// Unix seconds at which the session block lifts, passed through as is.
    pub cooldown_ends_at: Option<i64>,
}

/// Clamp remaining counts at zero and settle the blocked flags.
///
/// Explicit flags are authoritative; a missing flag is derived from the
/// clamped remaining count.
#[must_use]
pub fn normalize_usage_status(input: UsageStatusInput) -> UsageStatusResponse {
    let sessions_remaining = clamp_remaining(input.sessions_remaining);
    let messages_remaining = clamp_remaining(input.messages_remaining);
    let is_session_blocked = input
        .is_session_blocked
        .unwrap_or(sessions_remaining == 0);
    let is_message_blocked = input
        .is_message_blocked
        .unwrap_or(messages_remaining == 0);

    UsageStatusResponse {
        sessions_remaining,
        messages_remaining,
        is_limited: is_session_blocked || is_message_blocked,
        is_session_blocked,
        is_message_blocked,
        cooldown_ends_at: input.cooldown_ends_at,
    }
}

/// Project a store status against the caller's limits.
///
/// # Examples
///
/// ```rust
/// use chat_usage::domain::{build_usage_status_response, UsageStatus, FREE_LIMITS};
///
/// let status = UsageStatus { sessions_today: 5, ..UsageStatus::unlimited() };
/// let response = build_usage_status_response(&status, &FREE_LIMITS);
/// assert_eq!(response.sessions_remaining, 0);
/// ```
#[must_use]
pub fn build_usage_status_response(
    status: &UsageStatus,
    limits: &UsageLimits,
) -> UsageStatusResponse {
    normalize_usage_status(UsageStatusInput {
        sessions_remaining: i64::from(limits.sessions_per_day) - i64::from(status.sessions_today),
        messages_remaining: i64::from(limits.messages_per_day) - i64::from(status.messages_today),
        is_session_blocked: Some(status.is_session_blocked),
        is_message_blocked: Some(status.is_message_blocked),
        cooldown_ends_at: status.cooldown_ends_at,
    })
}

fn clamp_remaining(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}
