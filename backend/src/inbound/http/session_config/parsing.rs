//! Toggle parsing for session settings.
//!
//! Every reader follows the same build-mode policy: a missing or malformed
//! value is a warning plus a fallback in debug builds and a hard error in
//! release builds.

use actix_web::cookie::SameSite;
use mockable::Env;
use tracing::warn;

use super::{BuildMode, SAMESITE_ENV, SessionConfigError};

const FLAG_EXPECTED: &str = "1|0|true|false|yes|no|y|n";
const SAMESITE_EXPECTED: &str = "Strict|Lax|None";

/// Return `fallback` in debug builds, `error` otherwise.
pub(super) fn tolerate<T>(
    mode: BuildMode,
    fallback: T,
    error: SessionConfigError,
) -> Result<T, SessionConfigError> {
    if mode.is_debug() {
        warn!(%error, "session setting tolerated in debug build");
        Ok(fallback)
    } else {
        Err(error)
    }
}

/// Read a boolean toggle, defaulting to `default` when tolerated.
pub(super) fn read_flag<E: Env>(
    env: &E,
    mode: BuildMode,
    name: &'static str,
    default: bool,
) -> Result<bool, SessionConfigError> {
    let Some(raw) = env.string(name) else {
        return tolerate(mode, default, SessionConfigError::MissingEnv { name });
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Ok(true),
        "0" | "false" | "no" | "n" => Ok(false),
        _ => tolerate(
            mode,
            default,
            SessionConfigError::InvalidEnv {
                name,
                value: raw,
                expected: FLAG_EXPECTED,
            },
        ),
    }
}

/// Read `SESSION_SAMESITE`. `None` is only accepted with secure cookies.
pub(super) fn read_same_site<E: Env>(
    env: &E,
    mode: BuildMode,
    cookie_secure: bool,
) -> Result<SameSite, SessionConfigError> {
    let default = if mode.is_debug() {
        SameSite::Lax
    } else {
        SameSite::Strict
    };
    let Some(raw) = env.string(SAMESITE_ENV) else {
        return tolerate(mode, default, SessionConfigError::MissingEnv { name: SAMESITE_ENV });
    };
    match raw.to_ascii_lowercase().as_str() {
        "lax" => Ok(SameSite::Lax),
        "strict" => Ok(SameSite::Strict),
        "none" if cookie_secure => Ok(SameSite::None),
        "none" => tolerate(mode, SameSite::None, SessionConfigError::InsecureSameSiteNone),
        _ => tolerate(
            mode,
            default,
            SessionConfigError::InvalidEnv {
                name: SAMESITE_ENV,
                value: raw,
                expected: SAMESITE_EXPECTED,
            },
        ),
    }
}
