//! Time-boxed cache over the remote limits document.
//!
//! The resolver is built once at startup and shared through application
//! state. A successful fetch is reused until the TTL expires; a failed fetch
//! logs a warning and yields the presets without caching them, so the next
//! request retries.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use tracing::{debug, warn};

use super::ports::UsageLimitsSource;
use super::{normalize_usage_limits, UsageLimitsConfig};

/// Default revalidation window for remote limits.
pub const DEFAULT_LIMITS_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct CachedLimits {
    config: UsageLimitsConfig,
    expires_at: DateTime<Utc>,
}

/// Resolves effective limits, revalidating the remote document after `ttl`.
pub struct UsageLimitsResolver {
    source: Arc<dyn UsageLimitsSource>,
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
    cached: Mutex<Option<CachedLimits>>,
}

impl UsageLimitsResolver {
    /// Build a resolver over `source` with an explicit TTL.
    pub fn new(source: Arc<dyn UsageLimitsSource>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            source,
            clock,
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            cached: Mutex::new(None),
        }
    }

    /// Current effective limits. Never fails.
    pub async fn resolve(&self) -> UsageLimitsConfig {
        let now = self.clock.utc();
        let cached = *self.lock_cache();
        if let Some(cached) = cached.filter(|entry| now < entry.expires_at) {
            return cached.config;
        }

        match self.source.fetch_limits().await {
            Ok(document) => {
                let config = normalize_usage_limits(document.as_ref());
                let expires_at = now
                    .checked_add_signed(self.ttl)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                *self.lock_cache() = Some(CachedLimits { config, expires_at });
                debug!(remote = document.is_some(), "refreshed chat usage limits");
                config
            }
            Err(error) => {
                warn!(%error, "Failed to load chat usage limits config");
                UsageLimitsConfig::default()
            }
        }
    }

    fn lock_cache(&self) -> MutexGuard<'_, Option<CachedLimits>> {
        self.cached
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{MockUsageLimitsSource, UsageLimitsSourceError};
    use crate::domain::{UsageLimitsDocument, AUTH_LIMITS, FREE_LIMITS};
    use crate::test_support::MutableClock;
    use chrono::TimeZone;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn clock() -> Arc<MutableClock> {
        let start = Utc
            .with_ymd_and_hms(2025, 5, 1, 9, 0, 0)
            .single()
            .expect("valid instant");
        Arc::new(MutableClock::new(start))
    }

    fn document(free_sessions: u32) -> UsageLimitsDocument {
        UsageLimitsDocument {
            free_sessions_per_day: Some(json!(free_sessions)),
            ..UsageLimitsDocument::default()
        }
    }

    #[rstest]
    #[tokio::test]
    async fn caches_until_the_ttl_expires(clock: Arc<MutableClock>) {
        let mut source = MockUsageLimitsSource::new();
        let mut calls = 0_u32;
        source.expect_fetch_limits().times(2).returning(move || {
            calls += 1;
            Ok(Some(document(4 + calls)))
        });
        let resolver =
            UsageLimitsResolver::new(Arc::new(source), clock.clone(), DEFAULT_LIMITS_TTL);

        assert_eq!(resolver.resolve().await.free_limits.sessions_per_day, 5);
        clock.advance_seconds(59);
        assert_eq!(resolver.resolve().await.free_limits.sessions_per_day, 5);
        clock.advance_seconds(1);
        assert_eq!(resolver.resolve().await.free_limits.sessions_per_day, 6);
    }

    #[rstest]
    #[tokio::test]
    async fn failures_fall_back_to_presets_and_retry(clock: Arc<MutableClock>) {
        let mut source = MockUsageLimitsSource::new();
        let mut calls = 0_u32;
        source.expect_fetch_limits().times(2).returning(move || {
            calls += 1;
            if calls == 1 {
                Err(UsageLimitsSourceError::transport("timed out"))
            } else {
                Ok(Some(document(9)))
            }
        });
        let resolver = UsageLimitsResolver::new(Arc::new(source), clock, DEFAULT_LIMITS_TTL);

        let fallback = resolver.resolve().await;
        assert_eq!(fallback.free_limits, FREE_LIMITS);
        assert_eq!(fallback.auth_limits, AUTH_LIMITS);

        let recovered = resolver.resolve().await;
        assert_eq!(recovered.free_limits.sessions_per_day, 9);
    }

    #[rstest]
    #[tokio::test]
    async fn absent_document_yields_presets(clock: Arc<MutableClock>) {
        let mut source = MockUsageLimitsSource::new();
        source.expect_fetch_limits().times(1).returning(|| Ok(None));
        let resolver = UsageLimitsResolver::new(Arc::new(source), clock, DEFAULT_LIMITS_TTL);

        assert_eq!(resolver.resolve().await, UsageLimitsConfig::default());
        assert_eq!(resolver.resolve().await, UsageLimitsConfig::default());
    }
}
