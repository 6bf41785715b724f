//! Embedded PostgreSQL provisioning for store integration tests.
//!
//! One cluster is shared per test binary. Each test clones a fresh database
//! from a template that already carries the usage schema, so migrations run
//! once per migrations-directory hash rather than once per test.

use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use chat_usage::outbound::persistence::run_migrations;
use pg_embedded_setup_unpriv::test_support::hash_directory;
use pg_embedded_setup_unpriv::{ClusterHandle, TemporaryDatabase};
use postgres::{Client, NoTls};
use uuid::Uuid;

use super::format_postgres_error;

static TEMPLATE_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const TEMPLATE_NAME_PREFIX: &str = "chat_usage_template";
const PROVISION_RETRIES: usize = 5;
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Failures while preparing a test database.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("embedded cluster: {0}")]
    Cluster(String),
    #[error("template database: {0}")]
    Template(String),
    #[error("migrations: {0}")]
    Migration(String),
    #[error("query: {0}")]
    Query(String),
}

/// Return the process-wide embedded cluster, retrying transient bootstrap
/// failures.
pub fn shared_cluster() -> Result<&'static ClusterHandle, SetupError> {
    ensure_stable_password();
    let mut attempt = 1;
    loop {
        match pg_embedded_setup_unpriv::test_support::shared_cluster_handle() {
            Ok(handle) => return Ok(handle),
            Err(error) if attempt < PROVISION_RETRIES => {
                eprintln!("pg-embed: bootstrap attempt {attempt} failed: {error:?}");
                std::thread::sleep(RETRY_DELAY);
                attempt += 1;
            }
            Err(error) => return Err(SetupError::Cluster(format!("{error:?}"))),
        }
    }
}

/// Keep `PG_PASSWORD` fixed so a reused data directory still accepts the
/// credentials generated for it on first boot.
fn ensure_stable_password() {
    if std::env::var_os("PG_PASSWORD").is_none() {
        // SAFETY: runs before the cluster spawns threads; the shared cluster
        // singleton serialises first use.
        unsafe {
            std::env::set_var("PG_PASSWORD", "chat_usage_embedded_test");
        }
    }
}

fn migrations_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations")
}

fn template_database_name() -> Result<String, SetupError> {
    let hash = hash_directory(migrations_dir())
        .map_err(|err| SetupError::Template(format!("hash migrations: {err}")))?;
    let short_hash = hash.get(..8).unwrap_or(&hash);
    Ok(format!("{TEMPLATE_NAME_PREFIX}_{short_hash}"))
}

fn ensure_template_database(cluster: &ClusterHandle) -> Result<String, SetupError> {
    let template_name = template_database_name()?;
    let _lock = TEMPLATE_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|err| err.into_inner());

    let exists = cluster
        .database_exists(template_name.as_str())
        .map_err(|err| SetupError::Template(format!("exists check: {err:?}")))?;
    if !exists {
        cluster
            .create_database(template_name.as_str())
            .map_err(|err| SetupError::Template(format!("create: {err:?}")))?;
        migrate_schema(&cluster.connection().database_url(&template_name))?;
    }
    Ok(template_name)
}

/// Apply the crate's embedded migrations to `url`.
pub fn migrate_schema(url: &str) -> Result<(), SetupError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| SetupError::Migration(err.to_string()))?;
    runtime
        .block_on(run_migrations(url))
        .map_err(|err| SetupError::Migration(err.to_string()))
}

/// Clone a fresh database from the migrated template.
pub fn provision_template_database(
    cluster: &ClusterHandle,
) -> Result<TemporaryDatabase, SetupError> {
    let mut last_error = None;
    for attempt in 1..=PROVISION_RETRIES {
        let result = ensure_template_database(cluster).and_then(|template| {
            cluster
                .temporary_database_from_template(
                    format!("test_{}", Uuid::new_v4().simple()).as_str(),
                    template.as_str(),
                )
                .map_err(|err| {
                    SetupError::Template(format!(
                        "clone attempt {attempt}/{PROVISION_RETRIES}: {err:?}"
                    ))
                })
        });
        match result {
            Ok(database) => return Ok(database),
            Err(error) => last_error = Some(error),
        }
        if attempt < PROVISION_RETRIES {
            std::thread::sleep(RETRY_DELAY);
        }
    }
    Err(last_error
        .unwrap_or_else(|| SetupError::Template("exhausted retries".to_owned())))
}

/// Count stored records of `kind` for `subject`, bypassing the store.
pub fn count_records(url: &str, subject: &str, kind: &str) -> Result<i64, SetupError> {
    let mut client = Client::connect(url, NoTls)
        .map_err(|err| SetupError::Query(format_postgres_error(&err)))?;
    let row = client
        .query_one(
            "SELECT count(*) FROM usage_records WHERE visitor_id = $1 AND kind = $2",
            &[&subject, &kind],
        )
        .map_err(|err| SetupError::Query(format_postgres_error(&err)))?;
    Ok(row.get(0))
}
