use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::schema::*;

/// Upper bound on a stored nonce, in bytes.
pub const NONCE_MAX_LEN: usize = 65;

#[derive(Debug, Clone, Queryable)]
#[diesel(table_name = pending)]
pub struct PendingRow {
    pub id: Uuid,
    pub nonce: Vec<u8>,
    pub expiration: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingSession {
    pub id: Uuid,
    #[serde(with = "hex_bytes")]
    pub nonce: Vec<u8>,
    pub expiration: DateTime<Utc>,
}

impl TryFrom<PendingRow> for PendingSession {
    type Error = StoreError;

    fn try_from(row: PendingRow) -> Result<Self, Self::Error> {
        if row.nonce.len() > NONCE_MAX_LEN {
            return Err(StoreError::malformed(
                "pending",
                format!("nonce of {} bytes exceeds {NONCE_MAX_LEN}", row.nonce.len()),
            ));
        }
        Ok(Self {
            id: row.id,
            nonce: row.nonce,
            expiration: row.expiration,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = pending)]
pub struct NewPending<'a> {
    pub id: Uuid,
    pub nonce: &'a [u8],
    pub expiration: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Identifiable, Insertable)]
#[diesel(table_name = sessions)]
pub struct Session {
    pub id: Uuid,
    pub user_id: String,
    pub expiration: DateTime<Utc>,
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = offices)]
pub struct Office {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = offices)]
pub struct NewOffice<'a> {
    pub name: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Serialize)]
#[diesel(table_name = invitations)]
pub struct Invitation {
    pub office: i32,
    pub email: String,
    pub permission: i32,
    pub creation: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = invitations)]
pub struct NewInvitation<'a> {
    pub office: i32,
    pub email: &'a str,
    pub permission: i32,
    pub creation: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable)]
#[diesel(table_name = staff)]
pub struct Staff {
    pub user_id: String,
    pub office: i32,
    pub permission: i32,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = staff)]
pub struct NewStaff<'a> {
    pub user_id: &'a str,
    pub office: i32,
    pub permission: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryState {
    Active,
    Deprecated,
    Deleted,
}

impl CategoryState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deprecated => "deprecated",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for CategoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryState {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "deprecated" => Ok(Self::Deprecated),
            "deleted" => Ok(Self::Deleted),
            other => Err(StoreError::malformed(
                "categories",
                format!("unknown state {other:?}"),
            )),
        }
    }
}

#[derive(Debug, Clone, Queryable)]
#[diesel(table_name = categories)]
pub struct CategoryRow {
    pub id: i32,
    pub name: String,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub state: CategoryState,
}

impl TryFrom<CategoryRow> for Category {
    type Error = StoreError;

    fn try_from(row: CategoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            state: row.state.parse()?,
            name: row.name,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Queryable, Serialize, Deserialize)]
pub struct CategorySummary {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = categories)]
pub struct NewCategory<'a> {
    pub name: &'a str,
    pub state: &'a str,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = batches)]
pub struct BatchRow {
    pub id: i32,
    pub office: i32,
    pub creation: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = batches)]
pub struct NewBatch {
    pub id: i32,
    pub office: i32,
    pub creation: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = barcodes)]
pub struct NewBarcode {
    pub code: Uuid,
    pub batch: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Identifiable)]
#[diesel(table_name = documents)]
pub struct Document {
    pub id: i32,
    pub category: i32,
    pub title: String,
    pub barcode: Option<Uuid>,
    pub creation: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = documents)]
pub struct NewDocument<'a> {
    pub category: i32,
    pub title: &'a str,
    pub barcode: Option<Uuid>,
    pub creation: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable)]
#[diesel(table_name = subscriptions)]
pub struct Subscription {
    pub endpoint: String,
    pub expiration: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = subscriptions)]
pub struct NewSubscription<'a> {
    pub endpoint: &'a str,
    pub expiration: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification<'a> {
    pub endpoint: &'a str,
    pub document: i32,
}

mod hex_bytes {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }
}
