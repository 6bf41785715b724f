//! Internal Diesel row structs for the usage tables.
//!
//! These types never leave the persistence layer.

use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{usage_records, usage_visitors};

/// Insertable visitor row; on conflict only `last_seen_at` moves.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = usage_visitors)]
pub(crate) struct NewVisitorRow<'a> {
    pub id: &'a str,
    pub created_at: i64,
    pub last_seen_at: i64,
}

/// Insertable usage event.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = usage_records)]
pub(crate) struct NewUsageRecordRow<'a> {
    pub id: Uuid,
    pub visitor_id: &'a str,
    pub kind: &'a str,
    pub occurred_at: i64,
}

/// Per-kind count for one subject inside a day window.
#[derive(Debug, Clone, Queryable)]
pub(crate) struct KindCountRow {
    pub kind: String,
    pub count: i64,
}
