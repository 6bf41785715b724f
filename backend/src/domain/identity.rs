//! Visitor identity resolution.
//!
//! A request is metered under a *subject*. Signed-in users are metered by
//! their auth provider id. Everyone else gets a salted SHA-256 fingerprint of
//! their network seed and user agent, so raw IPs are never stored.

use std::fmt;

use mockable::Env;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;
use utoipa::ToSchema;
use zeroize::Zeroizing;

use super::BuildMode;

/// Environment variable holding the guest fingerprint salt.
pub const USAGE_SALT_ENV: &str = "USAGE_SALT";

const DEV_USAGE_SALT: &str = "chat-usage-development-salt";
const FINGERPRINT_DELIMITER: [u8; 1] = [0];
const SUBJECT_LOG_PREFIX_LEN: usize = 12;

/// Errors raised while resolving identity configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityConfigError {
    /// The salt is required in release builds.
    #[error("missing required environment variable: {name}")]
    MissingSalt { name: &'static str },
}

/// Secret salt mixed into guest fingerprints.
///
/// The value is zeroed on drop and never printed.
#[derive(Clone)]
pub struct UsageSalt(Zeroizing<String>);

impl UsageSalt {
    /// Wrap an explicit salt value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Read the salt from `USAGE_SALT`.
    ///
    /// Blank values count as missing. Debug builds fall back to a fixed
    /// development salt and warn; release builds fail.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityConfigError::MissingSalt`] in release builds when the
    /// variable is absent or blank.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chat_usage::domain::{BuildMode, UsageSalt};
    /// use mockable::MockEnv;
    ///
    /// let mut env = MockEnv::new();
    /// env.expect_string().returning(|_| None);
    /// assert!(UsageSalt::from_env(&env, BuildMode::Release).is_err());
    /// ```
    pub fn from_env<E: Env>(env: &E, mode: BuildMode) -> Result<Self, IdentityConfigError> {
        match env.string(USAGE_SALT_ENV) {
            Some(value) if !value.trim().is_empty() => Ok(Self::new(value)),
            _ if mode.is_debug() => {
                warn!("{USAGE_SALT_ENV} not set; using development salt");
                Ok(Self::new(DEV_USAGE_SALT))
            }
            _ => Err(IdentityConfigError::MissingSalt {
                name: USAGE_SALT_ENV,
            }),
        }
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for UsageSalt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UsageSalt(<redacted>)")
    }
}

/// Quota tier a subject is metered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VisitorTier {
    /// Anonymous visitor identified by fingerprint.
    Guest,
    /// Signed-in user identified by auth provider id.
    Authenticated,
}

/// Request signals used to derive a subject.
///
/// Empty strings stand for missing values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitorSignals {
    /// Client IP resolved with [`resolve_client_ip`].
    pub ip: String,
    /// Raw `User-Agent` header value.
    pub user_agent: String,
    /// Long-lived visitor cookie value.
    pub visitor_id: String,
    /// Auth provider user id, when the caller is signed in.
    pub auth_user_id: Option<String>,
}

impl VisitorSignals {
    /// Whether a non-empty auth user id is present.
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.auth_user_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

/// Resolved metering identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitorIdentity {
    subject: String,
    tier: VisitorTier,
}

impl VisitorIdentity {
    /// Subject key under which usage is counted.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Tier used to select limits.
    #[must_use]
    pub fn tier(&self) -> VisitorTier {
        self.tier
    }

    /// Whether the identity belongs to a signed-in user.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self.tier, VisitorTier::Authenticated)
    }

    /// Shortened subject that is safe to put in logs.
    #[must_use]
    pub fn log_label(&self) -> &str {
        match self.tier {
            VisitorTier::Authenticated => self.subject(),
            VisitorTier::Guest => self
                .subject
                .get(..SUBJECT_LOG_PREFIX_LEN)
                .unwrap_or(self.subject()),
        }
    }
}

/// Derives subjects from request signals with a fixed salt.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    salt: UsageSalt,
}

impl IdentityResolver {
    /// Create a resolver bound to `salt`.
    #[must_use]
    pub fn new(salt: UsageSalt) -> Self {
        Self { salt }
    }

    /// Build the metering identity for a request.
    ///
    /// A non-empty auth user id always wins. Otherwise the fingerprint seed
    /// is the IP, or the visitor id when the IP is blank.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chat_usage::domain::{IdentityResolver, UsageSalt, VisitorSignals, VisitorTier};
    ///
    /// let resolver = IdentityResolver::new(UsageSalt::new("salt"));
    /// let identity = resolver.build_visitor_identity(&VisitorSignals {
    ///     auth_user_id: Some("user_123".to_owned()),
    ///     ..VisitorSignals::default()
    /// });
    /// assert_eq!(identity.subject(), "user_123");
    /// assert_eq!(identity.tier(), VisitorTier::Authenticated);
    /// ```
    #[must_use]
    pub fn build_visitor_identity(&self, signals: &VisitorSignals) -> VisitorIdentity {
        if let Some(user_id) = signals.auth_user_id.as_deref().filter(|id| !id.is_empty()) {
            return VisitorIdentity {
                subject: user_id.to_owned(),
                tier: VisitorTier::Authenticated,
            };
        }

        let seed = if signals.ip.trim().is_empty() {
            signals.visitor_id.as_str()
        } else {
            signals.ip.as_str()
        };
        VisitorIdentity {
            subject: hash_visitor_fingerprint(&self.salt, seed, &signals.user_agent),
            tier: VisitorTier::Guest,
        }
    }
}

/// Hex SHA-256 of `salt`, `seed` and `user_agent` joined by NUL bytes.
#[must_use]
pub fn hash_visitor_fingerprint(salt: &UsageSalt, seed: &str, user_agent: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(FINGERPRINT_DELIMITER);
    hasher.update(seed.as_bytes());
    hasher.update(FINGERPRINT_DELIMITER);
    hasher.update(user_agent.as_bytes());
    hex::encode(hasher.finalize())
}

/// Pick the client IP from proxy headers.
///
/// Headers are only honoured behind a trusted proxy; otherwise any client
/// could spoof them. The first `X-Forwarded-For` entry wins, then
/// `X-Real-IP`, then the empty string.
///
/// # Examples
///
/// ```rust
/// use chat_usage::domain::resolve_client_ip;
///
/// assert_eq!(resolve_client_ip(Some("1.2.3.4, 10.0.0.1"), None, true), "1.2.3.4");
/// assert_eq!(resolve_client_ip(Some("1.2.3.4"), None, false), "");
/// ```
#[must_use]
pub fn resolve_client_ip(
    forwarded_for: Option<&str>,
    real_ip: Option<&str>,
    trusted_proxy: bool,
) -> String {
    if !trusted_proxy {
        return String::new();
    }

    let forwarded = forwarded_for
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    forwarded
        .or_else(|| real_ip.filter(|value| !value.is_empty()))
        .unwrap_or_default()
        .to_owned()
}
