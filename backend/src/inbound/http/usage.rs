//! Chat usage HTTP handlers.
//!
//! ```text
//! GET /api/chat/usage
//! POST /api/chat/session
//! POST /api/chat/messages
//! POST /api/chat/auth
//! DELETE /api/chat/auth
//! ```
//!
//! Every handler echoes a freshly minted `visitor_id` cookie so the next
//! request is metered under the same subject.

use actix_web::{HttpResponse, get, post, web};

use crate::domain::ports::ChatSessionGrant;
use crate::domain::{Error, UsageStatusResponse};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::{sign_in, sign_out};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::visitor::Visitor;

/// Remaining daily quota for the caller.
#[utoipa::path(
    get,
    path = "/api/chat/usage",
    responses(
        (status = 200, description = "Usage status", body = UsageStatusResponse),
        (status = 503, description = "Usage store unavailable", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["chat"],
    operation_id = "getChatUsage",
    security([])
)]
#[get("/usage")]
pub async fn get_usage(state: web::Data<HttpState>, visitor: Visitor) -> ApiResult<HttpResponse> {
    let status = state.usage_status.usage_status(visitor.signals()).await?;
    Ok(visitor.respond(HttpResponse::Ok()).json(status))
}

/// Open a metered chat session.
///
/// A rejected session leaves the day's count untouched; the error details
/// carry the status and limits behind the decision.
#[utoipa::path(
    post,
    path = "/api/chat/session",
    responses(
        (status = 200, description = "Session created", body = ChatSessionGrant),
        (status = 429, description = "Daily session limit reached", body = Error),
        (status = 502, description = "Upstream session request failed", body = Error),
        (status = 503, description = "Provider not configured or store unavailable", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["chat"],
    operation_id = "createChatSession",
    security([])
)]
#[post("/session")]
pub async fn create_session(
    state: web::Data<HttpState>,
    visitor: Visitor,
) -> ApiResult<HttpResponse> {
    let grant = state.chat_usage.create_session(visitor.signals()).await?;
    Ok(visitor.respond(HttpResponse::Ok()).json(grant))
}

/// Account for one sent message.
#[utoipa::path(
    post,
    path = "/api/chat/messages",
    responses(
        (status = 200, description = "Message recorded", body = UsageStatusResponse),
        (status = 429, description = "Daily message limit reached", body = Error),
        (status = 503, description = "Usage store unavailable", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["chat"],
    operation_id = "recordChatMessage",
    security([])
)]
#[post("/messages")]
pub async fn record_message(
    state: web::Data<HttpState>,
    visitor: Visitor,
) -> ApiResult<HttpResponse> {
    let status = state.chat_usage.record_message(visitor.signals()).await?;
    Ok(visitor.respond(HttpResponse::Ok()).json(status))
}

/// Mount the chat usage handlers under `/api/chat`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/chat")
            .service(get_usage)
            .service(create_session)
            .service(record_message)
            .service(sign_in)
            .service(sign_out),
    );
}
