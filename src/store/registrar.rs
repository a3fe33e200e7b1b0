use diesel::prelude::*;

use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::models::{NewStaff, NewUser};
use crate::schema::{invitations, staff, users};

/// Onboards freshly authenticated users by turning their pending invitations
/// into staff memberships.
#[derive(Clone)]
pub struct UserRegistrar {
    db: Database,
}

impl UserRegistrar {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Refreshes a known user (returning `None`), or registers a new one and
    /// returns the offices their invitations granted them.
    ///
    /// The invitations are deleted before the staff rows are written, all in
    /// one serializable transaction, so an invitation is consumed at most once.
    pub fn insert_invited_user(&self, user: &NewUser) -> StoreResult<Option<Vec<i32>>> {
        let granted = self.db.serializable(|conn| {
            let updated = diesel::update(users::table.find(user.id.as_str()))
                .set((users::name.eq(&user.name), users::email.eq(&user.email)))
                .execute(conn)?;
            match updated {
                0 => {}
                1 => return Ok(None),
                n => {
                    return Err(StoreError::invariant(format!(
                        "{n} users updated for id {}",
                        user.id
                    )))
                }
            }

            let invites: Vec<(i32, i32)> = diesel::delete(
                invitations::table.filter(invitations::email.eq(&user.email)),
            )
            .returning((invitations::office, invitations::permission))
            .get_results(conn)?;

            diesel::insert_into(users::table)
                .values(user)
                .execute(conn)?;

            let memberships: Vec<NewStaff<'_>> = invites
                .iter()
                .map(|&(office, permission)| NewStaff {
                    user_id: &user.id,
                    office,
                    permission,
                })
                .collect();
            if !memberships.is_empty() {
                diesel::insert_into(staff::table)
                    .values(&memberships)
                    .execute(conn)?;
            }

            Ok(Some(invites.into_iter().map(|(office, _)| office).collect()))
        })?;

        match &granted {
            Some(offices) => tracing::info!(
                user_id = %user.id,
                offices = ?offices,
                "registered invited user"
            ),
            None => tracing::debug!(user_id = %user.id, "refreshed existing user"),
        }
        Ok(granted)
    }
}
