//! Diesel table definitions for the usage schema.
//!
//! These definitions must match `migrations/` exactly. Regenerate with
//! `diesel print-schema` after changing a migration.

diesel::table! {
    /// One row per metered subject, upserted on every record call.
    usage_visitors (id) {
        /// Metering subject: auth user id or guest fingerprint.
        id -> Text,
        /// Unix seconds of the first recorded event.
        created_at -> BigInt,
        /// Unix seconds of the latest recorded event.
        last_seen_at -> BigInt,
    }
}

diesel::table! {
    /// Append-only usage events.
    usage_records (id) {
        /// Random UUID v4; carries no kind prefix.
        id -> Uuid,
        /// Owning subject.
        visitor_id -> Text,
        /// `session` or `message`.
        kind -> Text,
        /// Unix seconds.
        occurred_at -> BigInt,
    }
}

diesel::joinable!(usage_records -> usage_visitors (visitor_id));

diesel::allow_tables_to_appear_in_same_query!(usage_records, usage_visitors);
