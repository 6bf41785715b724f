//! Port for durable per-subject usage accounting.

use async_trait::async_trait;

use crate::domain::{RecordOutcome, UsageCaps, UsageStatus};

use super::define_port_error;

define_port_error! {
    /// Errors raised by usage store adapters.
    pub enum UsageStoreError {
        /// The store could not be reached.
        Connection { message: String } =>
            "usage store connection failed: {message}",
        /// A query or transaction failed.
        Query { message: String } =>
            "usage store query failed: {message}",
    }
}

/// Counts usage records and computes blocked state for the current local day.
///
/// Implementations must run `record_*` as a single atomic check-then-insert
/// so concurrent callers for one subject never exceed the cap.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Read today's status for `subject` without writing anything.
    async fn get_status(
        &self,
        subject: &str,
        caps: UsageCaps,
    ) -> Result<UsageStatus, UsageStoreError>;

    /// Record one session unless the subject is already session-blocked.
    ///
    /// Hitting the cap is not an error; it yields [`RecordOutcome::AtCap`].
    async fn record_session(
        &self,
        subject: &str,
        caps: UsageCaps,
    ) -> Result<RecordOutcome, UsageStoreError>;

    /// Record one message unless the subject is already message-blocked.
    ///
    /// The session cap plays no part here.
    async fn record_message(
        &self,
        subject: &str,
        caps: UsageCaps,
    ) -> Result<RecordOutcome, UsageStoreError>;
}

/// Store used when no database is configured: nothing is metered.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnmeteredUsageStore;

#[async_trait]
impl UsageStore for UnmeteredUsageStore {
    async fn get_status(
        &self,
        _subject: &str,
        _caps: UsageCaps,
    ) -> Result<UsageStatus, UsageStoreError> {
        Ok(UsageStatus::unlimited())
    }

    async fn record_session(
        &self,
        _subject: &str,
        _caps: UsageCaps,
    ) -> Result<RecordOutcome, UsageStoreError> {
        Ok(RecordOutcome::Recorded)
    }

    async fn record_message(
        &self,
        _subject: &str,
        _caps: UsageCaps,
    ) -> Result<RecordOutcome, UsageStoreError> {
        Ok(RecordOutcome::Recorded)
    }
}
