//! Driving port for reading a visitor's remaining quota.

use async_trait::async_trait;

use crate::domain::{
    build_usage_status_response, Error, UsageLimitsConfig, UsageStatus, UsageStatusResponse,
    VisitorSignals,
};

/// Domain use-case port for the read-only usage status.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsageStatusQuery: Send + Sync {
    /// Remaining quota for the visitor described by `signals`.
    async fn usage_status(&self, signals: &VisitorSignals) -> Result<UsageStatusResponse, Error>;
}

/// Fixture query reporting untouched default limits.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureUsageStatusQuery;

#[async_trait]
impl UsageStatusQuery for FixtureUsageStatusQuery {
    async fn usage_status(&self, signals: &VisitorSignals) -> Result<UsageStatusResponse, Error> {
        let limits = UsageLimitsConfig::default().for_signals(signals);
        Ok(build_usage_status_response(
            &UsageStatus::unlimited(),
            &limits,
        ))
    }
}
