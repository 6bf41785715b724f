//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod chat_session_provider;
mod chat_usage_command;
mod usage_limits_source;
mod usage_metrics;
mod usage_status_query;
mod usage_store;

#[cfg(test)]
pub use chat_session_provider::MockChatSessionProvider;
pub use chat_session_provider::{
    ChatSessionProvider, ChatSessionProviderError, FixtureChatSessionProvider,
};
#[cfg(test)]
pub use chat_usage_command::MockChatUsageCommand;
pub use chat_usage_command::{ChatSessionGrant, ChatUsageCommand, FixtureChatUsageCommand};
#[cfg(test)]
pub use usage_limits_source::MockUsageLimitsSource;
pub use usage_limits_source::{
    StaticUsageLimitsSource, UsageLimitsSource, UsageLimitsSourceError,
};
#[cfg(test)]
pub use usage_metrics::MockUsageMetrics;
pub use usage_metrics::{NoOpUsageMetrics, UsageDecision, UsageMetrics, UsageMetricsError};
#[cfg(test)]
pub use usage_status_query::MockUsageStatusQuery;
pub use usage_status_query::{FixtureUsageStatusQuery, UsageStatusQuery};
#[cfg(test)]
pub use usage_store::MockUsageStore;
pub use usage_store::{UnmeteredUsageStore, UsageStore, UsageStoreError};
