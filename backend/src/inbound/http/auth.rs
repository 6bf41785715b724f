//! Sign-in and sign-out handlers.
//!
//! ```text
//! POST /api/chat/auth
//! DELETE /api/chat/auth
//! ```
//!
//! Sign-in accepts an assertion signed by the auth provider and, once it
//! verifies, stores the user id in the private session cookie. Later requests
//! carrying that cookie are metered under the authenticated tier.

use actix_web::{HttpResponse, delete, post, web};
use tracing::{info, warn};

use crate::domain::{AuthHandoff, Error};
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

/// Exchange a signed assertion for an authenticated session.
#[utoipa::path(
    post,
    path = "/api/chat/auth",
    request_body = AuthHandoff,
    responses(
        (status = 204, description = "Signed in"),
        (status = 401, description = "Assertion rejected", body = Error),
        (status = 503, description = "Sign-in not configured", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["chat"],
    operation_id = "signIn",
    security([])
)]
#[post("/auth")]
pub async fn sign_in(
    state: web::Data<HttpState>,
    session: SessionContext,
    body: web::Json<AuthHandoff>,
) -> ApiResult<HttpResponse> {
    let verifier = state
        .auth_handoff
        .as_ref()
        .ok_or_else(|| Error::service_unavailable("Sign-in is not configured"))?;
    let user_id = verifier.verify(&body).map_err(|error| {
        warn!(%error, "rejected sign-in assertion");
        Error::unauthorized("Invalid sign-in assertion")
    })?;
    session.persist_auth_user(&user_id)?;
    info!("visitor signed in");
    Ok(HttpResponse::NoContent().finish())
}

/// Forget the authenticated user; later requests are metered as a guest.
#[utoipa::path(
    delete,
    path = "/api/chat/auth",
    responses(
        (status = 204, description = "Signed out")
    ),
    tags = ["chat"],
    operation_id = "signOut",
    security([])
)]
#[delete("/auth")]
pub async fn sign_out(session: SessionContext) -> HttpResponse {
    session.clear_auth_user();
    HttpResponse::NoContent().finish()
}
