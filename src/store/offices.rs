use diesel::prelude::*;

use crate::db::Database;
use crate::error::StoreResult;
use crate::models::NewOffice;
use crate::schema::offices;

#[derive(Clone)]
pub struct OfficeStore {
    db: Database,
}

impl OfficeStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn create_office(&self, name: &str) -> StoreResult<i32> {
        let id = self.db.run(|conn| {
            Ok(diesel::insert_into(offices::table)
                .values(&NewOffice { name })
                .returning(offices::id)
                .get_result::<i32>(conn)?)
        })?;
        tracing::info!(office = id, name, "created office");
        Ok(id)
    }

    pub fn rename_office(&self, id: i32, name: &str) -> StoreResult<bool> {
        let updated = self.db.run(|conn| {
            Ok(diesel::update(offices::table.find(id))
                .set(offices::name.eq(name))
                .execute(conn)?)
        })?;
        Ok(updated == 1)
    }
}
