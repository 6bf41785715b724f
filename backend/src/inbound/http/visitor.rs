//! Visitor signal extraction.
//!
//! Collects the identity inputs for a request: client IP (proxy headers only
//! when trusted), user agent, the long-lived `visitor_id` cookie and the
//! authenticated user id from the session. A request without a visitor
//! cookie gets a fresh UUID, which the handler must echo back with
//! [`Visitor::respond`].

use actix_web::cookie::time::Duration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::http::header::{HeaderMap, USER_AGENT};
use actix_web::{FromRequest, HttpRequest, HttpResponseBuilder, dev::Payload, web};
use futures_util::future::LocalBoxFuture;
use uuid::Uuid;

use crate::domain::{VisitorSignals, resolve_client_ip};
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

/// Name of the long-lived visitor cookie.
pub const VISITOR_COOKIE: &str = "visitor_id";

const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";
const VISITOR_COOKIE_MAX_AGE_DAYS: i64 = 365;

/// Identity inputs for the current request.
#[derive(Debug, Clone)]
pub struct Visitor {
    signals: VisitorSignals,
    minted: Option<Cookie<'static>>,
}

impl Visitor {
    /// Signals to hand to the domain.
    pub fn signals(&self) -> &VisitorSignals {
        &self.signals
    }

    /// Start a response, attaching the visitor cookie when one was minted.
    pub fn respond(&self, mut builder: HttpResponseBuilder) -> HttpResponseBuilder {
        if let Some(cookie) = &self.minted {
            builder.cookie(cookie.clone());
        }
        builder
    }

    fn from_parts(req: &HttpRequest, trusted_proxy: bool, auth_user_id: Option<String>) -> Self {
        let headers = req.headers();
        let ip = resolve_client_ip(
            header_str(headers, FORWARDED_FOR),
            header_str(headers, REAL_IP),
            trusted_proxy,
        );
        let user_agent = header_str(headers, USER_AGENT.as_str())
            .unwrap_or_default()
            .to_owned();

        let existing = req
            .cookie(VISITOR_COOKIE)
            .map(|cookie| cookie.value().to_owned())
            .filter(|value| !value.is_empty());
        let (visitor_id, minted) = match existing {
            Some(id) => (id, None),
            None => {
                let id = Uuid::new_v4().to_string();
                let secure = req.connection_info().scheme() == "https";
                let cookie = visitor_cookie(id.clone(), secure);
                (id, Some(cookie))
            }
        };

        Self {
            signals: VisitorSignals {
                ip,
                user_agent,
                visitor_id,
                auth_user_id,
            },
            minted,
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn visitor_cookie(id: String, secure: bool) -> Cookie<'static> {
    Cookie::build(VISITOR_COOKIE, id)
        .path("/")
        .max_age(Duration::days(VISITOR_COOKIE_MAX_AGE_DAYS))
        .same_site(SameSite::Lax)
        .secure(secure)
        .finish()
}

impl FromRequest for Visitor {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let session = SessionContext::from_request(req, payload);
        let trusted_proxy = req
            .app_data::<web::Data<HttpState>>()
            .is_some_and(|state| state.trusted_proxy);
        let req = req.clone();
        Box::pin(async move {
            let auth_user_id = session.await?.auth_user_id()?;
            Ok(Self::from_parts(&req, trusted_proxy, auth_user_id))
        })
    }
}
