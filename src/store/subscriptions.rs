use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::models::{NewNotification, NewSubscription, Subscription};
use crate::schema::{notifications, subscriptions};

/// Web-push endpoints and the documents they follow.
#[derive(Clone)]
pub struct SubscriptionStore {
    db: Database,
}

impl SubscriptionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Registers `endpoint`, replacing the expiration of a known one.
    /// A `None` expiration never lapses.
    pub fn push_subscription(
        &self,
        endpoint: &str,
        expiration: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let affected = self.db.run(|conn| {
            Ok(diesel::insert_into(subscriptions::table)
                .values(&NewSubscription {
                    endpoint,
                    expiration,
                })
                .on_conflict(subscriptions::endpoint)
                .do_update()
                .set(subscriptions::expiration.eq(expiration))
                .execute(conn)?)
        })?;

        if affected != 1 {
            return Err(StoreError::invariant(format!(
                "subscription upsert touched {affected} rows"
            )));
        }
        Ok(())
    }

    pub fn get_subscription(&self, endpoint: &str) -> StoreResult<Option<Subscription>> {
        self.db.run(|conn| {
            Ok(subscriptions::table
                .find(endpoint)
                .first::<Subscription>(conn)
                .optional()?)
        })
    }

    /// Hooks a subscription to a document. `false` if it already was.
    pub fn hook_subscription(&self, endpoint: &str, document: i32) -> StoreResult<bool> {
        let affected = self.db.run(|conn| {
            Ok(diesel::insert_into(notifications::table)
                .values(&NewNotification { endpoint, document })
                .on_conflict_do_nothing()
                .execute(conn)?)
        })?;

        match affected {
            0 => Ok(false),
            1 => Ok(true),
            n => Err(StoreError::invariant(format!(
                "subscription hook touched {n} rows"
            ))),
        }
    }
}
