use std::sync::Arc;

use chrono::Duration;

use crate::{
    config::AppConfig,
    db::{self, Database, PgPool},
    error::StoreResult,
    store::{
        BatchIssuer, CategoryStore, InvitationStore, OfficeStore, SessionStore,
        SubscriptionStore, UserRegistrar,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub database: Database,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig) -> Self {
        Self {
            database: Database::new(pool.clone()),
            pool,
            config: Arc::new(config),
        }
    }

    pub fn sessions(&self) -> SessionStore {
        SessionStore::new(
            self.database.clone(),
            Duration::minutes(self.config.pending_session_ttl_minutes),
        )
    }

    pub fn invitations(&self) -> InvitationStore {
        InvitationStore::new(self.database.clone())
    }

    pub fn registrar(&self) -> UserRegistrar {
        UserRegistrar::new(self.database.clone())
    }

    pub fn offices(&self) -> OfficeStore {
        OfficeStore::new(self.database.clone())
    }

    pub fn categories(&self) -> CategoryStore {
        CategoryStore::new(self.database.clone())
    }

    pub fn batches(&self) -> BatchIssuer {
        BatchIssuer::new(self.database.clone())
    }

    pub fn subscriptions(&self) -> SubscriptionStore {
        SubscriptionStore::new(self.database.clone())
    }

    /// Runs a store operation, retrying serialization conflicts up to the
    /// configured limit.
    pub fn retry<T, F>(&self, op: F) -> StoreResult<T>
    where
        F: FnMut() -> StoreResult<T>,
    {
        db::retry_on_conflict(self.config.serialization_retry_limit, op)
    }
}
