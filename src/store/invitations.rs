use chrono::{DateTime, Utc};
use diesel::{dsl::exists, prelude::*};
use serde::Serialize;

use crate::db::Database;
use crate::error::StoreResult;
use crate::models::{Invitation, NewInvitation};
use crate::schema::{invitations, users};

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Serialize)]
pub struct RevokedInvitation {
    pub permission: i32,
    pub creation: DateTime<Utc>,
}

#[derive(Clone)]
pub struct InvitationStore {
    db: Database,
}

impl InvitationStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Invites `email` to `office`, or refreshes an existing invitation.
    ///
    /// Returns the stored creation time, or `None` when the address already
    /// belongs to a registered user.
    pub fn upsert_invitation(
        &self,
        office: i32,
        email: &str,
        permission: i32,
    ) -> StoreResult<Option<DateTime<Utc>>> {
        let now = self.db.now();
        let creation = self.db.serializable(|conn| {
            let registered =
                diesel::select(exists(users::table.filter(users::email.eq(email))))
                    .get_result::<bool>(conn)?;
            if registered {
                return Ok(None);
            }

            let creation = diesel::insert_into(invitations::table)
                .values(&NewInvitation {
                    office,
                    email,
                    permission,
                    creation: now,
                })
                .on_conflict((invitations::office, invitations::email))
                .do_update()
                .set((
                    invitations::permission.eq(permission),
                    invitations::creation.eq(now),
                ))
                .returning(invitations::creation)
                .get_result::<DateTime<Utc>>(conn)?;
            Ok(Some(creation))
        })?;

        match creation {
            Some(_) => tracing::info!(office, email, permission, "upserted invitation"),
            None => tracing::debug!(office, email, "refused invitation for registered user"),
        }
        Ok(creation)
    }

    pub fn revoke_invitation(
        &self,
        office: i32,
        email: &str,
    ) -> StoreResult<Option<RevokedInvitation>> {
        let revoked = self.db.run(|conn| {
            Ok(diesel::delete(invitations::table.find((office, email)))
                .returning((invitations::permission, invitations::creation))
                .get_result::<RevokedInvitation>(conn)
                .optional()?)
        })?;

        if revoked.is_some() {
            tracing::info!(office, email, "revoked invitation");
        }
        Ok(revoked)
    }

    pub fn list_invitations(&self, office: i32) -> StoreResult<Vec<Invitation>> {
        self.db.run(|conn| {
            Ok(invitations::table
                .filter(invitations::office.eq(office))
                .order((invitations::creation.asc(), invitations::email.asc()))
                .load(conn)?)
        })
    }
}
