//! Prometheus adapter for usage gate decisions.
//!
//! Decisions are exported as a single counter registered with a provided
//! registry and served from the `/metrics` endpoint.

use async_trait::async_trait;
use prometheus::{CounterVec, Opts, Registry};

use crate::domain::ports::{UsageDecision, UsageMetrics, UsageMetricsError};
use crate::domain::{UsageKind, VisitorTier};

/// Prometheus-backed usage decision recorder.
///
/// # Metric Specification
///
/// - **Name**: `chat_usage_decisions_total`
/// - **Type**: Counter
/// - **Labels**:
///   - `kind`: `session` or `message`
///   - `tier`: `guest` or `authenticated`
///   - `decision`: `admitted` or `rejected`
pub struct PrometheusUsageMetrics {
    decisions_total: CounterVec,
}

impl PrometheusUsageMetrics {
    /// Create and register metrics with the given registry.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric with the same name already exists in the
    /// registry.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let decisions_total = CounterVec::new(
            Opts::new(
                "chat_usage_decisions_total",
                "Metered chat usage decisions by kind, tier, and outcome",
            ),
            &["kind", "tier", "decision"],
        )?;
        registry.register(Box::new(decisions_total.clone()))?;
        Ok(Self { decisions_total })
    }
}

fn tier_label(tier: VisitorTier) -> &'static str {
    match tier {
        VisitorTier::Guest => "guest",
        VisitorTier::Authenticated => "authenticated",
    }
}

#[async_trait]
impl UsageMetrics for PrometheusUsageMetrics {
    async fn record_decision(
        &self,
        kind: UsageKind,
        tier: VisitorTier,
        decision: UsageDecision,
    ) -> Result<(), UsageMetricsError> {
        self.decisions_total
            .with_label_values(&[kind.as_str(), tier_label(tier), decision.as_str()])
            .inc();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_registration_fails() {
        let registry = Registry::new();
        PrometheusUsageMetrics::new(&registry).expect("first registration succeeds");
        assert!(PrometheusUsageMetrics::new(&registry).is_err());
    }

    #[tokio::test]
    async fn increments_counter_with_decision_labels() {
        let registry = Registry::new();
        let metrics =
            PrometheusUsageMetrics::new(&registry).expect("metric registration should succeed");

        for _ in 0..2 {
            metrics
                .record_decision(UsageKind::Session, VisitorTier::Guest, UsageDecision::Rejected)
                .await
                .expect("recording never fails");
        }

        let counter = metrics
            .decisions_total
            .with_label_values(&["session", "guest", "rejected"]);
        assert_eq!(counter.get() as u64, 2);
        assert!(
            registry
                .gather()
                .iter()
                .any(|f| f.name() == "chat_usage_decisions_total")
        );
    }
}
