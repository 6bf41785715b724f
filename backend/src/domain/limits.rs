//! Daily usage limits and their remote overrides.
//!
//! Limits come in two presets, one per [`VisitorTier`]. A remote document may
//! override individual fields; every field is validated on its own and falls
//! back to the preset value, so a bad override never zeroes a quota.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::{VisitorSignals, VisitorTier};

/// Daily quotas for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageLimits {
    /// Chat sessions allowed per local day.
    pub sessions_per_day: u32,
    /// Chat messages allowed per local day.
    pub messages_per_day: u32,
    /// Lifetime of one chat session, in minutes.
    pub session_minutes: u32,
    /// Advertised cooldown once blocked, in hours.
    pub cooldown_hours: u32,
}

/// Preset for anonymous visitors.
pub const FREE_LIMITS: UsageLimits = UsageLimits {
    sessions_per_day: 3,
    messages_per_day: 20,
    session_minutes: 30,
    cooldown_hours: 1,
};

/// Preset for signed-in users.
pub const AUTH_LIMITS: UsageLimits = UsageLimits {
    sessions_per_day: 10,
    messages_per_day: 50,
    session_minutes: 30,
    cooldown_hours: 1,
};

/// Effective limits for both tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageLimitsConfig {
    /// Limits applied to guests.
    pub free_limits: UsageLimits,
    /// Limits applied to signed-in users.
    pub auth_limits: UsageLimits,
}

impl Default for UsageLimitsConfig {
    fn default() -> Self {
        Self {
            free_limits: FREE_LIMITS,
            auth_limits: AUTH_LIMITS,
        }
    }
}

/// Remote limits document as published by the content backend.
///
/// Values are kept as raw JSON so a single malformed field does not reject
/// the whole document. `sessionMinutes` and `cooldownHours` apply to both
/// tiers.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageLimitsDocument {
    /// Guest sessions per day.
    pub free_sessions_per_day: Option<Value>,
    /// Guest messages per day.
    pub free_messages_per_day: Option<Value>,
    /// Signed-in sessions per day.
    pub auth_sessions_per_day: Option<Value>,
    /// Signed-in messages per day.
    pub auth_messages_per_day: Option<Value>,
    /// Session lifetime in minutes.
    pub session_minutes: Option<Value>,
    /// Cooldown in hours.
    pub cooldown_hours: Option<Value>,
}

/// Merge a remote document over the presets.
///
/// A field is accepted when it is a finite number (or numeric string) of at
/// least one; fractional values round up. Anything else keeps the preset
/// value for that field only.
///
/// # Examples
///
/// ```rust
/// use chat_usage::domain::{normalize_usage_limits, UsageLimitsDocument, FREE_LIMITS};
/// use serde_json::json;
///
/// let doc = UsageLimitsDocument {
///     free_sessions_per_day: Some(json!(5)),
///     free_messages_per_day: Some(json!(0)),
///     ..UsageLimitsDocument::default()
/// };
/// let config = normalize_usage_limits(Some(&doc));
/// assert_eq!(config.free_limits.sessions_per_day, 5);
/// assert_eq!(config.free_limits.messages_per_day, FREE_LIMITS.messages_per_day);
/// ```
#[must_use]
pub fn normalize_usage_limits(doc: Option<&UsageLimitsDocument>) -> UsageLimitsConfig {
    let Some(doc) = doc else {
        return UsageLimitsConfig::default();
    };

    let session_minutes = doc.session_minutes.as_ref();
    let cooldown_hours = doc.cooldown_hours.as_ref();
    UsageLimitsConfig {
        free_limits: UsageLimits {
            sessions_per_day: positive_or(
                doc.free_sessions_per_day.as_ref(),
                FREE_LIMITS.sessions_per_day,
            ),
            messages_per_day: positive_or(
                doc.free_messages_per_day.as_ref(),
                FREE_LIMITS.messages_per_day,
            ),
            session_minutes: positive_or(session_minutes, FREE_LIMITS.session_minutes),
            cooldown_hours: positive_or(cooldown_hours, FREE_LIMITS.cooldown_hours),
        },
        auth_limits: UsageLimits {
            sessions_per_day: positive_or(
                doc.auth_sessions_per_day.as_ref(),
                AUTH_LIMITS.sessions_per_day,
            ),
            messages_per_day: positive_or(
                doc.auth_messages_per_day.as_ref(),
                AUTH_LIMITS.messages_per_day,
            ),
            session_minutes: positive_or(session_minutes, AUTH_LIMITS.session_minutes),
            cooldown_hours: positive_or(cooldown_hours, AUTH_LIMITS.cooldown_hours),
        },
    }
}

/// Pick the limits for a caller.
///
/// Falls back to the built-in presets when no config is supplied.
#[must_use]
pub fn select_usage_limits(is_signed_in: bool, config: Option<&UsageLimitsConfig>) -> UsageLimits {
    let config = config.copied().unwrap_or_default();
    if is_signed_in {
        config.auth_limits
    } else {
        config.free_limits
    }
}

impl UsageLimitsConfig {
    /// Limits for a resolved tier.
    #[must_use]
    pub fn for_tier(&self, tier: VisitorTier) -> UsageLimits {
        select_usage_limits(matches!(tier, VisitorTier::Authenticated), Some(self))
    }

    /// Limits for raw request signals, before a subject is derived.
    #[must_use]
    pub fn for_signals(&self, signals: &VisitorSignals) -> UsageLimits {
        select_usage_limits(signals.is_signed_in(), Some(self))
    }
}

fn positive_or(value: Option<&Value>, fallback: u32) -> u32 {
    let candidate = match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    match candidate {
        Some(number) if number.is_finite() && number >= 1.0 => ceil_to_u32(number),
        _ => fallback,
    }
}

/// Round up and clamp into `1..=u32::MAX`. Callers pass finite values >= 1.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "value is clamped to [1, u32::MAX] and integral before the cast"
)]
fn ceil_to_u32(number: f64) -> u32 {
    let clamped = number.ceil().clamp(1.0, f64::from(u32::MAX));
    clamped as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn doc_with(field: &str, value: Value) -> UsageLimitsDocument {
        serde_json::from_value(json!({ field: value })).expect("valid document")
    }

    #[rstest]
    fn missing_document_yields_presets() {
        assert_eq!(normalize_usage_limits(None), UsageLimitsConfig::default());
    }

    #[rstest]
    fn auth_message_override_leaves_everything_else_alone() {
        let config = normalize_usage_limits(Some(&doc_with("authMessagesPerDay", json!(75))));
        assert_eq!(config.free_limits, FREE_LIMITS);
        assert_eq!(
            config.auth_limits,
            UsageLimits {
                messages_per_day: 75,
                ..AUTH_LIMITS
            }
        );
    }

    #[rstest]
    fn shared_fields_apply_to_both_tiers() {
        let doc: UsageLimitsDocument =
            serde_json::from_value(json!({ "sessionMinutes": 45, "cooldownHours": 6 }))
                .expect("valid document");
        let config = normalize_usage_limits(Some(&doc));
        assert_eq!(config.free_limits.session_minutes, 45);
        assert_eq!(config.auth_limits.session_minutes, 45);
        assert_eq!(config.free_limits.cooldown_hours, 6);
        assert_eq!(config.auth_limits.cooldown_hours, 6);
    }

    #[rstest]
    #[case(json!(0))]
    #[case(json!(-4))]
    #[case(json!(0.5))]
    #[case(json!("NaN"))]
    #[case(json!("inf"))]
    #[case(json!("abc"))]
    #[case(json!(""))]
    #[case(json!(null))]
    #[case(json!(true))]
    #[case(json!([7]))]
    fn invalid_values_fall_back_per_field(#[case] value: Value) {
        let config = normalize_usage_limits(Some(&doc_with("freeSessionsPerDay", value)));
        assert_eq!(config.free_limits.sessions_per_day, FREE_LIMITS.sessions_per_day);
    }

    #[rstest]
    #[case(json!(1), 1)]
    #[case(json!(12), 12)]
    #[case(json!("8"), 8)]
    #[case(json!(2.5), 3)]
    #[case(json!(1e12), u32::MAX)]
    #[case(json!(4_294_967_295_u64), u32::MAX)]
    #[case(json!(4_294_967_294.2), u32::MAX)]
    #[case(json!("1e300"), u32::MAX)]
    #[case(json!(1.000_001), 2)]
    fn valid_values_are_accepted(#[case] value: Value, #[case] expected: u32) {
        let config = normalize_usage_limits(Some(&doc_with("freeSessionsPerDay", value)));
        assert_eq!(config.free_limits.sessions_per_day, expected);
    }

    #[rstest]
    fn unknown_fields_are_ignored() {
        let doc: UsageLimitsDocument =
            serde_json::from_value(json!({ "_id": "singleton", "freeMessagesPerDay": 9 }))
                .expect("valid document");
        assert_eq!(
            normalize_usage_limits(Some(&doc)).free_limits.messages_per_day,
            9
        );
    }

    #[rstest]
    #[case(true, AUTH_LIMITS)]
    #[case(false, FREE_LIMITS)]
    fn select_uses_builtin_config_by_default(
        #[case] signed_in: bool,
        #[case] expected: UsageLimits,
    ) {
        assert_eq!(select_usage_limits(signed_in, None), expected);
    }

    #[rstest]
    fn select_honours_supplied_config() {
        let config = normalize_usage_limits(Some(&doc_with("authSessionsPerDay", json!(42))));
        assert_eq!(select_usage_limits(true, Some(&config)).sessions_per_day, 42);
        assert_eq!(
            config.for_tier(VisitorTier::Guest),
            select_usage_limits(false, Some(&config))
        );
    }
}
