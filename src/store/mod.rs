//! Transactional data access for sessions, memberships, categories and
//! barcode batches.
//!
//! Each store wraps a [`Database`](crate::db::Database) handle and opens one
//! unit of work per operation. Operations that read and then write across
//! relations run SERIALIZABLE and may fail with
//! [`StoreError::SerializationFailure`](crate::error::StoreError); retrying is
//! left to the caller (see [`retry_on_conflict`](crate::db::retry_on_conflict)).

pub mod batches;
pub mod categories;
pub mod invitations;
pub mod offices;
pub mod registrar;
pub mod sessions;
pub mod subscriptions;

pub use batches::{Batch, BatchIssuer, CodeGenerator, RandomCodes, RetiredBatch, BATCH_SIZE};
pub use categories::{CategoryRemoval, CategoryStore};
pub use invitations::{InvitationStore, RevokedInvitation};
pub use offices::OfficeStore;
pub use registrar::UserRegistrar;
pub use sessions::{
    InvalidatedSession, OsEntropy, PurgedSessions, SessionEntropy, SessionStore, NONCE_LEN,
};
pub use subscriptions::SubscriptionStore;
