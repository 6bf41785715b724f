//! PostgreSQL-backed usage store.
//!
//! Record calls run as one transaction: upsert the visitor row, count
//! today's records, then insert only if the subject is under the cap. The
//! upsert takes a row lock on the subject, so concurrent transactions for
//! the same subject queue behind it and their counts (fresh per statement
//! under READ COMMITTED) include every committed record.

use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use mockable::Clock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::ports::{UsageStore, UsageStoreError};
use crate::domain::{
    DayWindow, RecordOutcome, UsageCaps, UsageCounts, UsageKind, UsageStatus,
};

use super::models::{KindCountRow, NewUsageRecordRow, NewVisitorRow};
use super::pool::{DbPool, PoolError};
use super::schema::{usage_records, usage_visitors};

/// Diesel implementation of [`UsageStore`].
#[derive(Clone)]
pub struct DieselUsageStore {
    pool: DbPool,
    clock: Arc<dyn Clock>,
}

impl DieselUsageStore {
    /// Create a store over `pool`. `clock` supplies event times and the
    /// local day boundary.
    pub fn new(pool: DbPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    async fn record(
        &self,
        subject: &str,
        caps: UsageCaps,
        kind: UsageKind,
    ) -> Result<RecordOutcome, UsageStoreError> {
        use diesel_async::AsyncConnection as _;
        use diesel_async::scoped_futures::ScopedFutureExt as _;

        let now = self.clock.local();
        let window = DayWindow::containing(&now);
        let occurred_at = now.timestamp();
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let outcome = conn
            .transaction::<_, diesel::result::Error, _>(|conn| {
                async move {
                    touch_visitor(conn, subject, occurred_at).await?;
                    let status = status_in(conn, subject, caps, window).await?;
                    let blocked = match kind {
                        UsageKind::Session => status.is_session_blocked,
                        UsageKind::Message => status.is_message_blocked,
                    };
                    if blocked {
                        return Ok(RecordOutcome::AtCap);
                    }

                    diesel::insert_into(usage_records::table)
                        .values(&NewUsageRecordRow {
                            id: Uuid::new_v4(),
                            visitor_id: subject,
                            kind: kind.as_str(),
                            occurred_at,
                        })
                        .execute(conn)
                        .await?;
                    Ok(RecordOutcome::Recorded)
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;

        debug!(%kind, ?outcome, "usage record processed");
        Ok(outcome)
    }
}

async fn touch_visitor(
    conn: &mut AsyncPgConnection,
    subject: &str,
    now: i64,
) -> Result<(), diesel::result::Error> {
    diesel::insert_into(usage_visitors::table)
        .values(&NewVisitorRow {
            id: subject,
            created_at: now,
            last_seen_at: now,
        })
        .on_conflict(usage_visitors::id)
        .do_update()
        .set(usage_visitors::last_seen_at.eq(excluded(usage_visitors::last_seen_at)))
        .execute(conn)
        .await?;
    Ok(())
}

async fn status_in(
    conn: &mut AsyncPgConnection,
    subject: &str,
    caps: UsageCaps,
    window: DayWindow,
) -> Result<UsageStatus, diesel::result::Error> {
    let rows: Vec<KindCountRow> = usage_records::table
        .filter(usage_records::visitor_id.eq(subject))
        .filter(usage_records::occurred_at.ge(window.start()))
        .group_by(usage_records::kind)
        .select((usage_records::kind, diesel::dsl::count_star()))
        .load(conn)
        .await?;
    Ok(UsageStatus::evaluate(tally(rows), caps, window))
}

fn tally(rows: Vec<KindCountRow>) -> UsageCounts {
    let mut counts = UsageCounts::default();
    for row in rows {
        let count = u32::try_from(row.count).unwrap_or(u32::MAX);
        match row.kind.parse::<UsageKind>() {
            Ok(UsageKind::Session) => counts.sessions = count,
            Ok(UsageKind::Message) => counts.messages = count,
            Err(err) => warn!(error = %err, "ignoring unknown usage kind"),
        }
    }
    counts
}

fn map_pool_error(error: PoolError) -> UsageStoreError {
    UsageStoreError::connection(error.into_message())
}

fn map_diesel_error(error: diesel::result::Error) -> UsageStoreError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _)
        | DieselError::BrokenTransactionManager => {
            UsageStoreError::connection("database connection error")
        }
        DieselError::QueryBuilderError(_) => UsageStoreError::query("database query error"),
        _ => UsageStoreError::query("database error"),
    }
}

#[async_trait]
impl UsageStore for DieselUsageStore {
    async fn get_status(
        &self,
        subject: &str,
        caps: UsageCaps,
    ) -> Result<UsageStatus, UsageStoreError> {
        let window = DayWindow::containing(&self.clock.local());
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        status_in(&mut conn, subject, caps, window)
            .await
            .map_err(map_diesel_error)
    }

    async fn record_session(
        &self,
        subject: &str,
        caps: UsageCaps,
    ) -> Result<RecordOutcome, UsageStoreError> {
        self.record(subject, caps, UsageKind::Session).await
    }

    async fn record_message(
        &self,
        subject: &str,
        caps: UsageCaps,
    ) -> Result<RecordOutcome, UsageStoreError> {
        self.record(subject, caps, UsageKind::Message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn row(kind: &str, count: i64) -> KindCountRow {
        KindCountRow {
            kind: kind.to_owned(),
            count,
        }
    }

    #[rstest]
    fn tally_splits_counts_by_kind() {
        let counts = tally(vec![row("message", 7), row("session", 2)]);
        assert_eq!(
            counts,
            UsageCounts {
                sessions: 2,
                messages: 7
            }
        );
    }

    #[rstest]
    fn tally_ignores_unknown_kinds() {
        let counts = tally(vec![row("upload", 4)]);
        assert_eq!(counts, UsageCounts::default());
    }

    #[rstest]
    fn closed_connections_map_to_connection_errors() {
        let err = map_diesel_error(diesel::result::Error::BrokenTransactionManager);
        assert!(matches!(err, UsageStoreError::Connection { .. }));
    }

    #[rstest]
    fn other_failures_map_to_query_errors() {
        let err = map_diesel_error(diesel::result::Error::NotFound);
        assert_eq!(err, UsageStoreError::query("database error"));
    }
}
