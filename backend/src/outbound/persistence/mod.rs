//! PostgreSQL persistence for usage accounting.
//!
//! Adapters here translate between Diesel rows and domain types and nothing
//! more. Row structs (`models.rs`) and table definitions (`schema.rs`) stay
//! private to this module; connections come from a `bb8` pool driven by
//! `diesel-async`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use chat_usage::outbound::persistence::{DbPool, DieselUsageStore, PoolConfig};
//!
//! # async fn wire() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/usage")).await?;
//! let store = DieselUsageStore::new(pool, Arc::new(mockable::DefaultClock));
//! # let _ = store;
//! # Ok(())
//! # }
//! ```

mod diesel_usage_store;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_usage_store::DieselUsageStore;
pub use migrations::{MIGRATIONS, MigrationError, run_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
