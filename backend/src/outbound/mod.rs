//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: PostgreSQL-backed usage store using Diesel
//! - **limits**: HTTP source for the remote limits document
//! - **chatkit**: HTTP client for upstream chat sessions
//! - **metrics**: Prometheus-backed metrics exporters (feature-gated)
//!
//! Adapters are thin translators between domain types and infrastructure
//! representations. They contain no business logic.

pub mod chatkit;
pub mod limits;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod persistence;
