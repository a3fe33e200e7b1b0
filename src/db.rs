use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::Connection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::error::{StoreError, StoreResult};

pub type PgPool = Pool<ConnectionManager<PgConnection>>;
pub type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

pub const DEFAULT_MAX_POOL_SIZE: u32 = 2;
pub const DEFAULT_RETRY_LIMIT: u32 = 3;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub fn init_pool_with_size(database_url: &str, max_size: u32) -> anyhow::Result<PgPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool_size = max_size.max(1);
    let pool = Pool::builder()
        .max_size(pool_size)
        .connection_timeout(Duration::from_secs(10))
        .build(manager)?;
    Ok(pool)
}

pub fn run_migrations(conn: &mut PgConnection) -> anyhow::Result<()> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|err| anyhow::anyhow!("failed to run migrations: {err}"))?;
    if !applied.is_empty() {
        tracing::info!(count = applied.len(), "applied pending migrations");
    }
    Ok(())
}

/// Hands out one logical connection per unit of work.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn acquire(&self) -> StoreResult<PgPooledConnection>;
}

impl ConnectionProvider for PgPool {
    fn acquire(&self) -> StoreResult<PgPooledConnection> {
        self.get()
            .map_err(|err| StoreError::Unavailable(format!("database pool error: {err}")))
    }
}

pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Shared handle the stores open their units of work through.
///
/// Every helper acquires a connection for the duration of the closure only.
/// The pooled connection goes back to the pool when it is dropped, so it is
/// released on every exit path; a transaction whose closure returns `Err` is
/// rolled back by diesel before that happens.
#[derive(Clone)]
pub struct Database {
    provider: Arc<dyn ConnectionProvider>,
    clock: Arc<dyn Clock>,
}

impl Database {
    pub fn new(provider: impl ConnectionProvider) -> Self {
        Self::with_clock(provider, Arc::new(SystemClock))
    }

    pub fn with_clock(provider: impl ConnectionProvider, clock: Arc<dyn Clock>) -> Self {
        Self {
            provider: Arc::new(provider),
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Runs `f` on a freshly acquired connection without an explicit transaction.
    pub fn run<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> StoreResult<T>,
    {
        let mut conn = self.provider.acquire()?;
        f(&mut *conn)
    }

    /// Runs `f` inside a transaction at the server's default isolation level.
    pub fn transaction<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> StoreResult<T>,
    {
        self.run(|conn| conn.transaction(f))
    }

    /// Runs `f` inside a SERIALIZABLE transaction.
    ///
    /// A conflicting concurrent commit surfaces as
    /// [`StoreError::SerializationFailure`]; see [`retry_on_conflict`].
    pub fn serializable<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> StoreResult<T>,
    {
        self.run(|conn| conn.build_transaction().serializable().run(f))
    }
}

/// Re-runs `op` while it fails with a serialization conflict, up to `limit`
/// attempts in total. Every other outcome is returned as is.
pub fn retry_on_conflict<T, F>(limit: u32, mut op: F) -> StoreResult<T>
where
    F: FnMut() -> StoreResult<T>,
{
    let limit = limit.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Err(err) if err.is_retryable() && attempt < limit => {
                tracing::debug!(attempt, limit, "retrying serializable transaction");
                attempt += 1;
            }
            outcome => return outcome,
        }
    }
}
