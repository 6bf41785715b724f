//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain ports (use-cases) and remain testable without I/O.

use std::sync::Arc;

use crate::domain::AuthHandoffVerifier;
use crate::domain::ports::{ChatUsageCommand, UsageStatusQuery};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub usage_status: Arc<dyn UsageStatusQuery>,
    pub chat_usage: Arc<dyn ChatUsageCommand>,
    /// Whether `x-forwarded-for` and `x-real-ip` may be trusted.
    pub trusted_proxy: bool,
    /// Verifier for sign-in assertions; `None` disables sign-in.
    pub auth_handoff: Option<Arc<AuthHandoffVerifier>>,
}

impl HttpState {
    /// Construct state from the driving ports with proxy headers ignored.
    ///
    /// # Examples
    /// ```no_run
    /// use std::sync::Arc;
    ///
    /// use chat_usage::domain::ports::{FixtureChatUsageCommand, FixtureUsageStatusQuery};
    /// use chat_usage::inbound::http::state::HttpState;
    ///
    /// let state = HttpState::new(
    ///     Arc::new(FixtureUsageStatusQuery),
    ///     Arc::new(FixtureChatUsageCommand),
    /// )
    /// .with_trusted_proxy(true);
    /// assert!(state.trusted_proxy);
    /// ```
    pub fn new(
        usage_status: Arc<dyn UsageStatusQuery>,
        chat_usage: Arc<dyn ChatUsageCommand>,
    ) -> Self {
        Self {
            usage_status,
            chat_usage,
            trusted_proxy: false,
            auth_handoff: None,
        }
    }

    /// Trust proxy headers when resolving client IPs.
    #[must_use]
    pub fn with_trusted_proxy(mut self, trusted_proxy: bool) -> Self {
        self.trusted_proxy = trusted_proxy;
        self
    }

    /// Enable sign-in with the given assertion verifier.
    #[must_use]
    pub fn with_auth_handoff(mut self, verifier: Option<AuthHandoffVerifier>) -> Self {
        self.auth_handoff = verifier.map(Arc::new);
        self
    }
}
