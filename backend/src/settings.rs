//! Service settings loaded via OrthoConfig.
//!
//! Values come from CLI flags, `USAGE_*` environment variables and config
//! files. Secrets (`USAGE_SALT`, `OPENAI_API_KEY`) are read separately
//! through `mockable::Env` so they never land in a settings dump.

use std::net::SocketAddr;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

const DEFAULT_BIND_ADDR: SocketAddr =
    SocketAddr::V4(std::net::SocketAddrV4::new(std::net::Ipv4Addr::UNSPECIFIED, 8080));

/// Configuration values for the chat usage service.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "USAGE")]
pub struct UsageSettings {
    /// PostgreSQL URL. Without one the service runs unmetered.
    pub database_url: Option<String>,
    /// Remote limits document endpoint. Without one the defaults apply.
    pub limits_url: Option<String>,
    /// Seconds a fetched limits document stays fresh.
    #[ortho_config(default = 60)]
    pub limits_ttl_secs: u64,
    /// Timeout for the limits fetch, in seconds.
    #[ortho_config(default = 5)]
    pub limits_timeout_secs: u64,
    /// Override for the upstream chat session endpoint.
    pub chatkit_url: Option<String>,
    /// Timeout for upstream session requests, in seconds.
    #[ortho_config(default = 15)]
    pub chatkit_timeout_secs: u64,
    /// Trust `x-forwarded-for` and `x-real-ip`.
    #[ortho_config(default = false)]
    pub trusted_proxy: bool,
    /// Listener address.
    pub bind_addr: Option<SocketAddr>,
}

impl UsageSettings {
    pub fn limits_ttl(&self) -> Duration {
        Duration::from_secs(self.limits_ttl_secs)
    }

    pub fn limits_timeout(&self) -> Duration {
        Duration::from_secs(self.limits_timeout_secs)
    }

    pub fn chatkit_timeout(&self) -> Duration {
        Duration::from_secs(self.chatkit_timeout_secs)
    }

    /// Listener address, defaulting to `0.0.0.0:8080`.
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr.unwrap_or(DEFAULT_BIND_ADDR)
    }
}
