//! Port for fetching the remote usage limits document.

use async_trait::async_trait;

use crate::domain::UsageLimitsDocument;

use super::define_port_error;

define_port_error! {
    /// Errors raised while fetching the limits document.
    pub enum UsageLimitsSourceError {
        /// Network failure or timeout.
        Transport { message: String } =>
            "limits source transport failed: {message}",
        /// Non-success HTTP status.
        Status { status: u16, message: String } =>
            "limits source returned {status}: {message}",
        /// Body was not a limits document.
        Decode { message: String } =>
            "limits source payload invalid: {message}",
    }
}

/// Source of the optional remote limits document.
///
/// `Ok(None)` means the source has no document; callers use the presets.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsageLimitsSource: Send + Sync {
    /// Fetch the current document.
    async fn fetch_limits(&self) -> Result<Option<UsageLimitsDocument>, UsageLimitsSourceError>;
}

/// Source used when no remote document is configured.
#[derive(Debug, Default, Clone)]
pub struct StaticUsageLimitsSource {
    document: Option<UsageLimitsDocument>,
}

impl StaticUsageLimitsSource {
    /// Always serve `document`.
    #[must_use]
    pub fn new(document: Option<UsageLimitsDocument>) -> Self {
        Self { document }
    }
}

#[async_trait]
impl UsageLimitsSource for StaticUsageLimitsSource {
    async fn fetch_limits(&self) -> Result<Option<UsageLimitsDocument>, UsageLimitsSourceError> {
        Ok(self.document.clone())
    }
}
