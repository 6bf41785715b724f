//! Verification of sign-in assertions from the external auth provider.
//!
//! The provider's backend signs `"{issued_at}:{user_id}"` with HMAC-SHA256
//! under a secret shared with this service and hands the result to the
//! browser. The sign-in route checks the signature and freshness before the
//! user id is stored in the session; nothing else can promote a visitor to
//! the authenticated tier.

use std::fmt;
use std::sync::Arc;

use hmac::{Hmac, Mac};
use mockable::{Clock, Env};
use serde::Deserialize;
use sha2::Sha256;
use utoipa::ToSchema;
use zeroize::Zeroizing;

/// Environment variable holding the shared handoff secret.
pub const AUTH_HANDOFF_SECRET_ENV: &str = "AUTH_HANDOFF_SECRET";

/// Shortest accepted secret, in bytes.
pub const AUTH_HANDOFF_SECRET_MIN_LEN: usize = 32;

/// Seconds an assertion stays valid either side of `issued_at`.
pub const AUTH_HANDOFF_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

/// Signed assertion that `user_id` is signed in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthHandoff {
    /// Auth provider user id.
    #[schema(example = "user_2abc")]
    pub user_id: String,
    /// Unix seconds at which the provider signed the assertion.
    pub issued_at: i64,
    /// Lowercase hex HMAC-SHA256 of `"{issuedAt}:{userId}"`.
    pub signature: String,
}

/// Why an assertion was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthHandoffError {
    /// The user id is blank.
    #[error("assertion carries no user id")]
    MissingUser,
    /// `issued_at` is outside the accepted window.
    #[error("assertion expired or issued in the future")]
    Stale,
    /// The signature is not valid hex.
    #[error("assertion signature is malformed")]
    MalformedSignature,
    /// The signature does not match.
    #[error("assertion signature does not verify")]
    BadSignature,
}

/// Problems with the configured secret.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthHandoffConfigError {
    #[error("{name} too short: need >= {min_len} bytes, got {length}")]
    SecretTooShort {
        name: &'static str,
        length: usize,
        min_len: usize,
    },
    #[error("{name} rejected as an HMAC key")]
    InvalidKey { name: &'static str },
}

/// Checks [`AuthHandoff`] assertions against the shared secret.
#[derive(Clone)]
pub struct AuthHandoffVerifier {
    keyed: HmacSha256,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for AuthHandoffVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthHandoffVerifier(<redacted>)")
    }
}

impl AuthHandoffVerifier {
    /// Build a verifier over `secret`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthHandoffConfigError::SecretTooShort`] when the secret is
    /// shorter than [`AUTH_HANDOFF_SECRET_MIN_LEN`].
    pub fn new(secret: Vec<u8>, clock: Arc<dyn Clock>) -> Result<Self, AuthHandoffConfigError> {
        let secret = Zeroizing::new(secret);
        if secret.len() < AUTH_HANDOFF_SECRET_MIN_LEN {
            return Err(AuthHandoffConfigError::SecretTooShort {
                name: AUTH_HANDOFF_SECRET_ENV,
                length: secret.len(),
                min_len: AUTH_HANDOFF_SECRET_MIN_LEN,
            });
        }
        let keyed = HmacSha256::new_from_slice(&secret).map_err(|_| {
            AuthHandoffConfigError::InvalidKey {
                name: AUTH_HANDOFF_SECRET_ENV,
            }
        })?;
        Ok(Self { keyed, clock })
    }

    /// Read the secret from `AUTH_HANDOFF_SECRET`. Absent or blank means
    /// sign-in is disabled and every visitor stays a guest.
    ///
    /// # Errors
    ///
    /// See [`AuthHandoffVerifier::new`].
    pub fn from_env<E: Env>(
        env: &E,
        clock: Arc<dyn Clock>,
    ) -> Result<Option<Self>, AuthHandoffConfigError> {
        env.string(AUTH_HANDOFF_SECRET_ENV)
            .filter(|value| !value.trim().is_empty())
            .map(|value| Self::new(value.into_bytes(), clock))
            .transpose()
    }

    fn mac(&self, issued_at: i64, user_id: &str) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(format!("{issued_at}:{user_id}").as_bytes());
        mac
    }

    /// Sign an assertion. Used by tooling and tests that stand in for the
    /// auth provider.
    #[must_use]
    pub fn sign(&self, user_id: &str, issued_at: i64) -> AuthHandoff {
        let signature = hex::encode(self.mac(issued_at, user_id).finalize().into_bytes());
        AuthHandoff {
            user_id: user_id.to_owned(),
            issued_at,
            signature,
        }
    }

    /// Verify `handoff` and return the user id it vouches for.
    ///
    /// # Errors
    ///
    /// See [`AuthHandoffError`].
    pub fn verify(&self, handoff: &AuthHandoff) -> Result<String, AuthHandoffError> {
        let user_id = handoff.user_id.trim();
        if user_id.is_empty() {
            return Err(AuthHandoffError::MissingUser);
        }
        let now = self.clock.utc().timestamp();
        if now.abs_diff(handoff.issued_at) > AUTH_HANDOFF_TOLERANCE_SECS.unsigned_abs() {
            return Err(AuthHandoffError::Stale);
        }
        let provided =
            hex::decode(&handoff.signature).map_err(|_| AuthHandoffError::MalformedSignature)?;
        self.mac(handoff.issued_at, &handoff.user_id)
            .verify_slice(&provided)
            .map_err(|_| AuthHandoffError::BadSignature)?;
        Ok(user_id.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MutableClock;
    use chrono::{TimeZone, Utc};
    use mockable::MockEnv;
    use rstest::{fixture, rstest};

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";
    const NOW: i64 = 1_750_000_000;

    #[fixture]
    fn verifier() -> AuthHandoffVerifier {
        let now = Utc.timestamp_opt(NOW, 0).single().expect("valid instant");
        AuthHandoffVerifier::new(SECRET.to_vec(), Arc::new(MutableClock::new(now)))
            .expect("secret long enough")
    }

    #[rstest]
    #[case::fresh(NOW)]
    #[case::slightly_old(NOW - AUTH_HANDOFF_TOLERANCE_SECS)]
    #[case::slight_skew(NOW + 30)]
    fn accepts_a_signed_assertion(verifier: AuthHandoffVerifier, #[case] issued_at: i64) {
        let handoff = verifier.sign("user_7", issued_at);
        assert_eq!(verifier.verify(&handoff), Ok("user_7".to_owned()));
    }

    #[rstest]
    fn rejects_a_tampered_user(verifier: AuthHandoffVerifier) {
        let mut handoff = verifier.sign("user_7", NOW);
        handoff.user_id = "user_8".to_owned();
        assert_eq!(verifier.verify(&handoff), Err(AuthHandoffError::BadSignature));
    }

    #[rstest]
    fn rejects_a_foreign_secret(verifier: AuthHandoffVerifier) {
        let other = AuthHandoffVerifier::new(
            b"another-secret-of-at-least-32-bytes!".to_vec(),
            Arc::new(MutableClock::new(Utc::now())),
        )
        .expect("secret long enough");
        let handoff = other.sign("user_7", NOW);
        assert_eq!(verifier.verify(&handoff), Err(AuthHandoffError::BadSignature));
    }

    #[rstest]
    #[case::expired(NOW - AUTH_HANDOFF_TOLERANCE_SECS - 1)]
    #[case::future(NOW + AUTH_HANDOFF_TOLERANCE_SECS + 1)]
    fn rejects_stale_assertions(verifier: AuthHandoffVerifier, #[case] issued_at: i64) {
        let handoff = verifier.sign("user_7", issued_at);
        assert_eq!(verifier.verify(&handoff), Err(AuthHandoffError::Stale));
    }

    #[rstest]
    fn rejects_blank_users_and_bad_hex(verifier: AuthHandoffVerifier) {
        let blank = verifier.sign("  ", NOW);
        assert_eq!(verifier.verify(&blank), Err(AuthHandoffError::MissingUser));

        let mut garbled = verifier.sign("user_7", NOW);
        garbled.signature = "not-hex".to_owned();
        assert_eq!(
            verifier.verify(&garbled),
            Err(AuthHandoffError::MalformedSignature)
        );
    }

    #[rstest]
    #[case::absent(None, false)]
    #[case::blank(Some("   "), false)]
    #[case::present(Some("0123456789abcdef0123456789abcdef"), true)]
    fn reads_the_secret_from_env(#[case] value: Option<&'static str>, #[case] enabled: bool) {
        let mut env = MockEnv::new();
        env.expect_string()
            .returning(move |_| value.map(str::to_owned));
        let verifier = AuthHandoffVerifier::from_env(&env, Arc::new(MutableClock::new(Utc::now())))
            .expect("valid configuration");
        assert_eq!(verifier.is_some(), enabled);
    }

    #[rstest]
    fn short_secrets_are_rejected() {
        let err = AuthHandoffVerifier::new(b"short".to_vec(), Arc::new(MutableClock::new(Utc::now())))
            .expect_err("short secret");
        assert!(matches!(
            err,
            AuthHandoffConfigError::SecretTooShort { length: 5, .. }
        ));
    }
}
