//! Remote limits document adapters.
//!
//! Provides an HTTP implementation of the `UsageLimitsSource` port.

mod http_source;

pub use http_source::HttpUsageLimitsSource;
