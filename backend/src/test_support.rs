//! Test utilities for the chat usage crate.
//!
//! Shared by unit tests in `src/` and integration tests in `tests/`. Compiled
//! for tests and behind the `test-support` feature.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, Utc};
use mockable::Clock;

use crate::domain::ports::{UsageStore, UsageStoreError};
use crate::domain::{
    DayWindow, RecordOutcome, UsageCaps, UsageCounts, UsageKind, UsageStatus,
};

/// Clock frozen at a settable instant.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    /// Freeze the clock at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    /// Move the clock forward by `delta`.
    ///
    /// # Panics
    ///
    /// Panics when `delta` does not fit in a [`TimeDelta`].
    pub fn advance(&self, delta: Duration) {
        let delta = match TimeDelta::from_std(delta) {
            Ok(delta) => delta,
            Err(error) => {
                panic!("failed to convert Duration to TimeDelta: {error}; delta={delta:?}")
            }
        };
        *self.lock_clock() += delta;
    }

    /// Move the clock by `seconds`; negative values move it back.
    pub fn advance_seconds(&self, seconds: i64) {
        *self.lock_clock() += TimeDelta::seconds(seconds);
    }

    fn lock_clock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("clock mutex"),
        }
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }
}

/// Usage store held in process memory.
///
/// A single mutex makes each record call atomic, matching the transactional
/// contract of the database adapter.
pub struct InMemoryUsageStore {
    clock: Arc<dyn Clock>,
    records: Mutex<HashMap<String, Vec<(UsageKind, i64)>>>,
}

impl InMemoryUsageStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Total records of `kind` ever stored for `subject`.
    pub fn count(&self, subject: &str, kind: UsageKind) -> usize {
        self.lock_records()
            .get(subject)
            .map_or(0, |rows| rows.iter().filter(|(k, _)| *k == kind).count())
    }

    fn lock_records(&self) -> MutexGuard<'_, HashMap<String, Vec<(UsageKind, i64)>>> {
        match self.records.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("usage store mutex"),
        }
    }

    fn status_of(rows: &[(UsageKind, i64)], caps: UsageCaps, window: DayWindow) -> UsageStatus {
        let today = |kind: UsageKind| {
            let count = rows
                .iter()
                .filter(|(k, at)| *k == kind && *at >= window.start())
                .count();
            u32::try_from(count).unwrap_or(u32::MAX)
        };
        let counts = UsageCounts {
            sessions: today(UsageKind::Session),
            messages: today(UsageKind::Message),
        };
        UsageStatus::evaluate(counts, caps, window)
    }

    fn record(&self, subject: &str, caps: UsageCaps, kind: UsageKind) -> RecordOutcome {
        let now = self.clock.local();
        let window = DayWindow::containing(&now);
        let mut records = self.lock_records();
        let rows = records.entry(subject.to_owned()).or_default();
        let status = Self::status_of(rows, caps, window);
        let blocked = match kind {
            UsageKind::Session => status.is_session_blocked,
            UsageKind::Message => status.is_message_blocked,
        };
        if blocked {
            return RecordOutcome::AtCap;
        }
        rows.push((kind, now.timestamp()));
        RecordOutcome::Recorded
    }
}

#[async_trait]
impl UsageStore for InMemoryUsageStore {
    async fn get_status(
        &self,
        subject: &str,
        caps: UsageCaps,
    ) -> Result<UsageStatus, UsageStoreError> {
        let window = DayWindow::containing(&self.clock.local());
        let records = self.lock_records();
        let rows = records.get(subject).map_or(&[][..], Vec::as_slice);
        Ok(Self::status_of(rows, caps, window))
    }

    async fn record_session(
        &self,
        subject: &str,
        caps: UsageCaps,
    ) -> Result<RecordOutcome, UsageStoreError> {
        Ok(self.record(subject, caps, UsageKind::Session))
    }

    async fn record_message(
        &self,
        subject: &str,
        caps: UsageCaps,
    ) -> Result<RecordOutcome, UsageStoreError> {
        let caps = UsageCaps {
            sessions_per_day: u32::MAX,
            ..caps
        };
        Ok(self.record(subject, caps, UsageKind::Message))
    }
}
