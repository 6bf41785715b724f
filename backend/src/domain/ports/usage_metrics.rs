//! Domain port for recording gate decisions.
//!
//! Lets the usage service count admitted and rejected requests without
//! knowing which metrics backend, if any, is attached.

use async_trait::async_trait;

use crate::domain::{UsageKind, VisitorTier};

use super::define_port_error;

define_port_error! {
    /// Errors exposed when recording usage metrics.
    pub enum UsageMetricsError {
        /// Metric exporter rejected the write.
        Export { message: String } => "usage metrics exporter failed: {message}",
    }
}

/// Result of a metered request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageDecision {
    /// A record was written.
    Admitted,
    /// The cap was reached; nothing was written.
    Rejected,
}

impl UsageDecision {
    /// Metric label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admitted => "admitted",
            Self::Rejected => "rejected",
        }
    }
}

/// Metrics recording port for gate decisions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsageMetrics: Send + Sync {
    /// Record one decision for `kind` and `tier`.
    async fn record_decision(
        &self,
        kind: UsageKind,
        tier: VisitorTier,
        decision: UsageDecision,
    ) -> Result<(), UsageMetricsError>;
}

/// No-op implementation for when metrics are disabled or in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpUsageMetrics;

#[async_trait]
impl UsageMetrics for NoOpUsageMetrics {
    async fn record_decision(
        &self,
        _kind: UsageKind,
        _tier: VisitorTier,
        _decision: UsageDecision,
    ) -> Result<(), UsageMetricsError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_record_decision_returns_ok() {
        let metrics = NoOpUsageMetrics;
        assert!(
            metrics
                .record_decision(UsageKind::Session, VisitorTier::Guest, UsageDecision::Rejected)
                .await
                .is_ok()
        );
    }

    #[test]
    fn decision_labels_are_stable() {
        assert_eq!(UsageDecision::Admitted.as_str(), "admitted");
        assert_eq!(UsageDecision::Rejected.as_str(), "rejected");
    }
}
