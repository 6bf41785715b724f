//! Usage accounting primitives: record kinds, the local-day window, and the
//! derived per-subject status.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, TimeZone};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::UsageLimits;

const SECONDS_PER_DAY: i64 = 86_400;

/// Kind of metered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UsageKind {
    /// A chat session was issued.
    Session,
    /// A chat message was sent.
    Message,
}

impl UsageKind {
    /// Stable storage value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Message => "message",
        }
    }
}

impl fmt::Display for UsageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a stored kind is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown usage kind: {0}")]
pub struct UnknownUsageKind(pub String);

impl FromStr for UsageKind {
    type Err = UnknownUsageKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "session" => Ok(Self::Session),
            "message" => Ok(Self::Message),
            other => Err(UnknownUsageKind(other.to_owned())),
        }
    }
}

/// Per-day caps the store evaluates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageCaps {
    /// Session cap.
    pub sessions_per_day: u32,
    /// Message cap.
    pub messages_per_day: u32,
}

impl From<&UsageLimits> for UsageCaps {
    fn from(limits: &UsageLimits) -> Self {
        Self {
            sessions_per_day: limits.sessions_per_day,
            messages_per_day: limits.messages_per_day,
        }
    }
}

/// Record counts for one subject inside the current day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageCounts {
    /// Sessions recorded since the start of the day.
    pub sessions: u32,
    /// Messages recorded since the start of the day.
    pub messages: u32,
}

/// Half-open local calendar day `[start, end)` in unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    start: i64,
    end: i64,
}

impl DayWindow {
    /// The local day containing `now`, in `now`'s time zone.
    ///
    /// Midnight falling into a DST gap resolves to the first valid instant
    /// after it.
    #[must_use]
    pub fn containing<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let tz = now.timezone();
        let today = now.date_naive();
        let start = local_midnight(&tz, today);
        let end = today
            .succ_opt()
            .map_or(start + SECONDS_PER_DAY, |next| local_midnight(&tz, next));
        Self { start, end }
    }

    /// First second of the day.
    #[must_use]
    pub const fn start(&self) -> i64 {
        self.start
    }

    /// First second of the next day.
    #[must_use]
    pub const fn end(&self) -> i64 {
        self.end
    }
}

fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> i64 {
    let midnight = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| {
            tz.from_local_datetime(&(midnight + TimeDelta::hours(1)))
                .earliest()
        })
        .map_or_else(|| midnight.and_utc().timestamp(), |dt| dt.timestamp())
}

/// Derived quota state for a subject. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageStatus {
    /// Sessions recorded today.
    pub sessions_today: u32,
    /// Messages recorded today.
    pub messages_today: u32,
    /// Whether the session cap is reached.
    pub is_session_blocked: bool,
    /// Whether the message cap is reached.
    pub is_message_blocked: bool,
    /// When the session block lifts (start of next local day), if blocked.
    pub cooldown_ends_at: Option<i64>,
}

impl UsageStatus {
    /// Evaluate counts against caps for `window`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chat_usage::domain::{DayWindow, UsageCaps, UsageCounts, UsageStatus};
    /// use chrono::{TimeZone, Utc};
    ///
    /// let window = DayWindow::containing(&Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap());
    /// let caps = UsageCaps { sessions_per_day: 2, messages_per_day: 5 };
    /// let status = UsageStatus::evaluate(UsageCounts { sessions: 2, messages: 1 }, caps, window);
    /// assert!(status.is_session_blocked);
    /// assert_eq!(status.cooldown_ends_at, Some(window.end()));
    /// ```
    #[must_use]
    pub fn evaluate(counts: UsageCounts, caps: UsageCaps, window: DayWindow) -> Self {
        let is_session_blocked = counts.sessions >= caps.sessions_per_day;
        Self {
            sessions_today: counts.sessions,
            messages_today: counts.messages,
            is_session_blocked,
            is_message_blocked: counts.messages >= caps.messages_per_day,
            cooldown_ends_at: is_session_blocked.then_some(window.end()),
        }
    }

    /// Status reported when no durable store is configured.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            sessions_today: 0,
            messages_today: 0,
            is_session_blocked: false,
            is_message_blocked: false,
            cooldown_ends_at: None,
        }
    }
}

/// Free-function alias for [`UsageStatus::unlimited`].
#[must_use]
pub const fn create_unlimited_usage_status() -> UsageStatus {
    UsageStatus::unlimited()
}

/// Whether a store accepted or skipped a record request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A new record was inserted.
    Recorded,
    /// The subject was already at the cap; nothing was written.
    AtCap,
}
