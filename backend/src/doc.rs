//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] registers the chat usage endpoints, health probes and the
//! payload schemas. Swagger UI serves it in debug builds.

use utoipa::OpenApi;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};

use crate::domain::ports::ChatSessionGrant;
use crate::domain::{AuthHandoff, Error, ErrorCode, UsageStatusResponse};

/// Document the session cookie set by `POST /api/chat/auth`.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "SessionCookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "session",
                "Optional session cookie carrying the authenticated user id.",
            ))),
        );
    }
}

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Chat usage API",
        description = "Daily quota metering for anonymous and signed-in chat visitors."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::usage::get_usage,
        crate::inbound::http::usage::create_session,
        crate::inbound::http::usage::record_message,
        crate::inbound::http::auth::sign_in,
        crate::inbound::http::auth::sign_out,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        AuthHandoff,
        Error,
        ErrorCode,
        UsageStatusResponse,
        ChatSessionGrant
    )),
    tags(
        (name = "chat", description = "Metered chat sessions and messages"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;
