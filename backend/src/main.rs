//! Chat usage entry-point: loads configuration, prepares the usage store and
//! starts the HTTP server.

mod server;

use std::sync::Arc;

use actix_web::web;
use mockable::{DefaultClock, DefaultEnv};
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use chat_usage::domain::{AuthHandoffVerifier, BuildMode, ChatProviderSettings, UsageSalt};
use chat_usage::inbound::http::health::HealthState;
use chat_usage::inbound::http::session_config::session_settings_from_env;
use chat_usage::inbound::http::state::HttpState;
use chat_usage::outbound::persistence::{DbPool, PoolConfig, run_migrations};
use chat_usage::settings::UsageSettings;
use server::{ServerConfig, ServiceInputs, build_usage_service, create_server};

fn io_error(context: &str, error: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(format!("{context}: {error}"))
}

async fn connect_store(database_url: Option<&str>) -> std::io::Result<Option<DbPool>> {
    let Some(url) = database_url else {
        return Ok(None);
    };
    run_migrations(url)
        .await
        .map_err(|e| io_error("database migrations failed", e))?;
    let pool = DbPool::new(PoolConfig::new(url))
        .await
        .map_err(|e| io_error("database pool", e))?;
    info!("usage store connected");
    Ok(Some(pool))
}

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = UsageSettings::load().map_err(|e| io_error("configuration", e))?;
    let env = DefaultEnv::new();
    let mode = BuildMode::from_debug_assertions();
    let salt = UsageSalt::from_env(&env, mode).map_err(|e| io_error("usage salt", e))?;
    let session =
        session_settings_from_env(&env, mode).map_err(|e| io_error("session settings", e))?;
    let provider = ChatProviderSettings::from_env(&env);
    let auth_handoff = AuthHandoffVerifier::from_env(&env, Arc::new(DefaultClock))
        .map_err(|e| io_error("auth handoff secret", e))?;
    if auth_handoff.is_none() {
        warn!("AUTH_HANDOFF_SECRET unset; sign-in disabled, all visitors metered as guests");
    }

    let bind_addr = settings.bind_addr();
    let trusted_proxy = settings.trusted_proxy;
    let pool = connect_store(settings.database_url.as_deref()).await?;
    let service = build_usage_service(ServiceInputs {
        settings,
        salt,
        provider,
        pool,
    })?;

    #[cfg(feature = "metrics")]
    let registry = prometheus::Registry::new();
    #[cfg(feature = "metrics")]
    let service = {
        let usage_metrics = chat_usage::outbound::metrics::PrometheusUsageMetrics::new(&registry)
            .map_err(|e| io_error("usage metrics registration failed", e))?;
        service.with_metrics(Arc::new(usage_metrics))
    };

    let service = Arc::new(service);
    let http_state = HttpState::new(service.clone(), service)
        .with_trusted_proxy(trusted_proxy)
        .with_auth_handoff(auth_handoff);
    let config = ServerConfig::new(session, bind_addr, http_state);
    #[cfg(feature = "metrics")]
    let config = config.with_registry(registry);

    let health_state = web::Data::new(HealthState::new());
    info!(%bind_addr, "starting chat usage server");
    create_server(health_state, config)?.await
}
