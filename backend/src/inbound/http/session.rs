//! Session helpers to keep HTTP handlers free of framework-specific logic.
//!
//! The private cookie session stores the authenticated user id and nothing
//! else. Only the sign-in route writes it, after the auth provider's signed
//! assertion has been verified.

use actix_session::Session;
use actix_web::{FromRequest, HttpRequest, dev::Payload};
use futures_util::future::LocalBoxFuture;

use crate::domain::Error;

pub(crate) const AUTH_USER_ID_KEY: &str = "auth_user_id";

/// Newtype wrapper that exposes higher-level session operations.
#[derive(Clone)]
pub struct SessionContext(Session);

impl SessionContext {
    /// Construct a new wrapper from the underlying Actix session.
    pub fn new(session: Session) -> Self {
        Self(session)
    }

    /// Persist a verified user id.
    pub fn persist_auth_user(&self, user_id: &str) -> Result<(), Error> {
        self.0
            .insert(AUTH_USER_ID_KEY, user_id)
            .map_err(|error| Error::internal(format!("failed to persist session: {error}")))
    }

    /// Drop the authenticated user id, returning the visitor to the guest tier.
    pub fn clear_auth_user(&self) {
        self.0.remove(AUTH_USER_ID_KEY);
    }

    /// Fetch the authenticated user id, if any.
    ///
    /// Blank values are treated as absent so a cleared id never promotes a
    /// visitor to the authenticated tier.
    pub fn auth_user_id(&self) -> Result<Option<String>, Error> {
        let id = self
            .0
            .get::<String>(AUTH_USER_ID_KEY)
            .map_err(|error| Error::internal(format!("failed to read session: {error}")))?;
        Ok(id.filter(|raw| !raw.trim().is_empty()))
    }
}

impl FromRequest for SessionContext {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let fut = Session::from_request(req, payload);
        Box::pin(async move { fut.await.map(SessionContext::new) })
    }
}
