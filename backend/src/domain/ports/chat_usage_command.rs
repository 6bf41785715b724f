//! Driving port for metered chat actions.
//!
//! Inbound adapters call this port to open a chat session or account for a
//! sent message. Both actions go through the usage gate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{
    build_usage_status_response, Error, UsageLimitsConfig, UsageStatus, UsageStatusResponse,
    VisitorSignals,
};

/// Secret handed to the chat widget for a new session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatSessionGrant {
    /// Opaque upstream client secret.
    pub client_secret: String,
}

/// Domain use-case port for metered chat actions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatUsageCommand: Send + Sync {
    /// Admit a new chat session or fail with a usage-limit error.
    async fn create_session(&self, signals: &VisitorSignals) -> Result<ChatSessionGrant, Error>;

    /// Account for one sent message and return the refreshed status.
    async fn record_message(&self, signals: &VisitorSignals)
    -> Result<UsageStatusResponse, Error>;
}

/// Fixture command that admits everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureChatUsageCommand;

#[async_trait]
impl ChatUsageCommand for FixtureChatUsageCommand {
    async fn create_session(&self, _signals: &VisitorSignals) -> Result<ChatSessionGrant, Error> {
        Ok(ChatSessionGrant {
            client_secret: "fixture-client-secret".to_owned(),
        })
    }

    async fn record_message(
        &self,
        signals: &VisitorSignals,
    ) -> Result<UsageStatusResponse, Error> {
        let limits = UsageLimitsConfig::default().for_signals(signals);
        Ok(build_usage_status_response(
            &UsageStatus::unlimited(),
            &limits,
        ))
    }
}
