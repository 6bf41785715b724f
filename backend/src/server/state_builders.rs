//! Builders for the usage service and its adapters.
//!
//! Each adapter has an offline fallback: no database means an unmetered
//! store, no limits URL means the built-in defaults.

use std::sync::Arc;
use std::time::Duration;

use mockable::{Clock, DefaultClock};
use reqwest::Url;
use tracing::{info, warn};

use chat_usage::domain::ports::{
    ChatSessionProvider, StaticUsageLimitsSource, UnmeteredUsageStore, UsageLimitsSource,
    UsageStore,
};
use chat_usage::domain::{
    ChatProviderSettings, IdentityResolver, UsageLimitsResolver, UsageSalt, UsageService,
};
use chat_usage::outbound::chatkit::{ChatKitHttpClient, DEFAULT_CHATKIT_SESSIONS_URL};
use chat_usage::outbound::limits::HttpUsageLimitsSource;
use chat_usage::outbound::persistence::{DbPool, DieselUsageStore};
use chat_usage::settings::UsageSettings;

/// Inputs gathered in `main` before the service graph is assembled.
pub struct ServiceInputs {
    pub settings: UsageSettings,
    pub salt: UsageSalt,
    pub provider: ChatProviderSettings,
    pub pool: Option<DbPool>,
}

fn parse_url(raw: &str, what: &str) -> std::io::Result<Url> {
    Url::parse(raw).map_err(|e| std::io::Error::other(format!("invalid {what} URL {raw:?}: {e}")))
}

fn build_store(pool: Option<DbPool>, clock: Arc<dyn Clock>) -> Arc<dyn UsageStore> {
    match pool {
        Some(pool) => Arc::new(DieselUsageStore::new(pool, clock)),
        None => {
            warn!("no database configured; chat usage is unmetered");
            Arc::new(UnmeteredUsageStore)
        }
    }
}

fn build_limits_source(
    url: Option<&str>,
    timeout: Duration,
) -> std::io::Result<Arc<dyn UsageLimitsSource>> {
    match url {
        Some(raw) => {
            let endpoint = parse_url(raw, "limits")?;
            info!(endpoint = %endpoint, "loading chat usage limits remotely");
            let source = HttpUsageLimitsSource::new(endpoint, timeout)
                .map_err(|e| std::io::Error::other(format!("limits client: {e}")))?;
            Ok(Arc::new(source))
        }
        None => Ok(Arc::new(StaticUsageLimitsSource::new(None))),
    }
}

fn build_provider(
    url: Option<&str>,
    timeout: Duration,
) -> std::io::Result<Arc<dyn ChatSessionProvider>> {
    let endpoint = parse_url(url.unwrap_or(DEFAULT_CHATKIT_SESSIONS_URL), "chatkit")?;
    let client = ChatKitHttpClient::new(endpoint, timeout)
        .map_err(|e| std::io::Error::other(format!("chatkit client: {e}")))?;
    Ok(Arc::new(client))
}

/// Assemble the usage service that backs both driving ports.
///
/// # Errors
/// Returns [`std::io::Error`] when a configured URL is invalid or an HTTP
/// client cannot be built.
pub fn build_usage_service(inputs: ServiceInputs) -> std::io::Result<UsageService> {
    let ServiceInputs {
        settings,
        salt,
        provider,
        pool,
    } = inputs;
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);

    let limits = UsageLimitsResolver::new(
        build_limits_source(settings.limits_url.as_deref(), settings.limits_timeout())?,
        Arc::clone(&clock),
        settings.limits_ttl(),
    );
    let upstream = build_provider(settings.chatkit_url.as_deref(), settings.chatkit_timeout())?;

    Ok(UsageService::new(
        IdentityResolver::new(salt),
        Arc::new(limits),
        build_store(pool, clock),
        upstream,
        provider,
    ))
}
