//! Upstream chat-session adapters.
//!
//! Provides an HTTP implementation of the `ChatSessionProvider` port.

mod http_client;

pub use http_client::{ChatKitHttpClient, DEFAULT_CHATKIT_SESSIONS_URL};
