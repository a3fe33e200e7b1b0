use std::sync::Arc;

use chrono::Duration;
use diesel::{dsl::exists, prelude::*};
use rand::{rngs::OsRng, RngCore};
use uuid::Uuid;

use crate::db::Database;
use crate::error::StoreResult;
use crate::models::{NewPending, PendingRow, PendingSession, Session, UserProfile};
use crate::schema::{pending, sessions, staff, users};

pub const NONCE_LEN: usize = 32;

/// Source of pending-session ids and nonces.
pub trait SessionEntropy: Send + Sync + 'static {
    fn session_id(&self) -> Uuid;
    fn nonce(&self) -> [u8; NONCE_LEN];
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl SessionEntropy for OsEntropy {
    fn session_id(&self) -> Uuid {
        Uuid::new_v4()
    }

    fn nonce(&self) -> [u8; NONCE_LEN] {
        let mut bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut bytes);
        bytes
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidatedSession {
    Pending(PendingSession),
    Session(Session),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgedSessions {
    pub pending: usize,
    pub sessions: usize,
}

/// Pending OAuth handshakes and the sessions they turn into.
///
/// Expiration is enforced at read time: an expired row behaves exactly like
/// an absent one for every lookup. [`SessionStore::purge_expired`] only
/// reclaims the space.
#[derive(Clone)]
pub struct SessionStore {
    db: Database,
    entropy: Arc<dyn SessionEntropy>,
    pending_ttl: Duration,
}

impl SessionStore {
    pub fn new(db: Database, pending_ttl: Duration) -> Self {
        Self::with_entropy(db, pending_ttl, Arc::new(OsEntropy))
    }

    pub fn with_entropy(
        db: Database,
        pending_ttl: Duration,
        entropy: Arc<dyn SessionEntropy>,
    ) -> Self {
        Self {
            db,
            entropy,
            pending_ttl,
        }
    }

    pub fn generate_pending_session(&self) -> StoreResult<PendingSession> {
        let nonce = self.entropy.nonce();
        let new_pending = NewPending {
            id: self.entropy.session_id(),
            nonce: &nonce,
            expiration: self.db.now() + self.pending_ttl,
        };

        let row: PendingRow = self.db.run(|conn| {
            Ok(diesel::insert_into(pending::table)
                .values(&new_pending)
                .get_result(conn)?)
        })?;

        tracing::debug!(session_id = %row.id, "generated pending session");
        PendingSession::try_from(row)
    }

    /// Returns the nonce of a live pending session, or an empty vector.
    pub fn get_pending_session_nonce(&self, id: Uuid) -> StoreResult<Vec<u8>> {
        let now = self.db.now();
        let row = self.db.run(|conn| {
            Ok(pending::table
                .find(id)
                .filter(pending::expiration.gt(now))
                .first::<PendingRow>(conn)
                .optional()?)
        })?;

        match row {
            Some(row) => Ok(PendingSession::try_from(row)?.nonce),
            None => Ok(Vec::new()),
        }
    }

    pub fn check_valid_session(&self, id: Uuid) -> StoreResult<bool> {
        let now = self.db.now();
        self.db.run(|conn| {
            Ok(diesel::select(exists(
                sessions::table
                    .find(id)
                    .filter(sessions::expiration.gt(now)),
            ))
            .get_result(conn)?)
        })
    }

    /// Consumes the pending session with the same id and records the
    /// authenticated session in its place.
    ///
    /// Returns the consumed pending row, or `None` when there was none.
    pub fn upgrade_session(&self, session: &Session) -> StoreResult<Option<PendingSession>> {
        let consumed = self.db.serializable(|conn| {
            let consumed = diesel::delete(pending::table.find(session.id))
                .get_result::<PendingRow>(conn)
                .optional()?;
            diesel::insert_into(sessions::table)
                .values(session)
                .execute(conn)?;
            consumed.map(PendingSession::try_from).transpose()
        })?;

        tracing::info!(
            session_id = %session.id,
            user_id = %session.user_id,
            had_pending = consumed.is_some(),
            "upgraded session"
        );
        Ok(consumed)
    }

    pub fn get_user_from_session(&self, id: Uuid) -> StoreResult<Option<UserProfile>> {
        let now = self.db.now();
        self.db.run(|conn| {
            Ok(sessions::table
                .inner_join(users::table)
                .filter(sessions::id.eq(id))
                .filter(sessions::expiration.gt(now))
                .select((users::name, users::email))
                .first::<UserProfile>(conn)
                .optional()?)
        })
    }

    pub fn get_permissions_from_session(&self, id: Uuid, office: i32) -> StoreResult<Option<i32>> {
        let now = self.db.now();
        self.db.run(|conn| {
            Ok(sessions::table
                .inner_join(staff::table.on(staff::user_id.eq(sessions::user_id)))
                .filter(sessions::id.eq(id))
                .filter(sessions::expiration.gt(now))
                .filter(staff::office.eq(office))
                .select(staff::permission)
                .first::<i32>(conn)
                .optional()?)
        })
    }

    /// Deletes whichever row, pending or upgraded, currently owns `id`.
    pub fn invalidate_session(&self, id: Uuid) -> StoreResult<Option<InvalidatedSession>> {
        let invalidated = self.db.serializable(|conn| {
            if let Some(row) = diesel::delete(pending::table.find(id))
                .get_result::<PendingRow>(conn)
                .optional()?
            {
                return Ok(Some(InvalidatedSession::Pending(row.try_into()?)));
            }

            let session = diesel::delete(sessions::table.find(id))
                .get_result::<Session>(conn)
                .optional()?;
            Ok(session.map(InvalidatedSession::Session))
        })?;

        if invalidated.is_some() {
            tracing::info!(session_id = %id, "invalidated session");
        }
        Ok(invalidated)
    }

    pub fn purge_expired(&self) -> StoreResult<PurgedSessions> {
        let now = self.db.now();
        let purged = self.db.transaction(|conn| {
            let pending = diesel::delete(pending::table.filter(pending::expiration.le(now)))
                .execute(conn)?;
            let sessions = diesel::delete(sessions::table.filter(sessions::expiration.le(now)))
                .execute(conn)?;
            Ok(PurgedSessions { pending, sessions })
        })?;

        tracing::info!(
            pending = purged.pending,
            sessions = purged.sessions,
            "purged expired sessions"
        );
        Ok(purged)
    }
}
