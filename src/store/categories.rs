//! Document categories and their lifecycle.
//!
//! ```text
//!   create ──► Active ◄──── activate ────┐
//!                │                        │
//!                └── delete (referenced) ─► Deprecated
//!                │                        │
//!                └── delete (unused) ─────┴──► Deleted (terminal)
//! ```
//!
//! A category that backs at least one document never leaves the catalog: a
//! delete only deprecates it, and it can be activated again later.

use diesel::{dsl::count_star, prelude::*};
use serde::Serialize;

use crate::db::Database;
use crate::error::StoreResult;
use crate::models::{Category, CategoryRow, CategoryState, CategorySummary, NewCategory};
use crate::schema::{categories, documents};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRemoval {
    pub name: String,
    /// `false` when the category was only deprecated.
    pub deleted: bool,
}

#[derive(Clone)]
pub struct CategoryStore {
    db: Database,
}

impl CategoryStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn create_category(&self, name: &str) -> StoreResult<i32> {
        let id = self.db.run(|conn| {
            Ok(diesel::insert_into(categories::table)
                .values(&NewCategory {
                    name,
                    state: CategoryState::Active.as_str(),
                })
                .returning(categories::id)
                .get_result::<i32>(conn)?)
        })?;
        tracing::info!(category = id, name, "created category");
        Ok(id)
    }

    pub fn get_category(&self, id: i32) -> StoreResult<Option<Category>> {
        let row = self.db.run(|conn| {
            Ok(categories::table
                .find(id)
                .first::<CategoryRow>(conn)
                .optional()?)
        })?;
        row.map(Category::try_from).transpose()
    }

    /// Brings a deprecated category back. Active categories are left alone.
    pub fn activate_category(&self, id: i32) -> StoreResult<Option<String>> {
        self.db.run(|conn| {
            Ok(diesel::update(
                categories::table
                    .find(id)
                    .filter(categories::state.ne(CategoryState::Deleted.as_str())),
            )
            .set(categories::state.eq(CategoryState::Active.as_str()))
            .returning(categories::name)
            .get_result::<String>(conn)
            .optional()?)
        })
    }

    pub fn rename_category(&self, id: i32, name: &str) -> StoreResult<bool> {
        let updated = self.db.run(|conn| {
            Ok(diesel::update(
                categories::table
                    .find(id)
                    .filter(categories::state.ne(CategoryState::Deleted.as_str())),
            )
            .set(categories::name.eq(name))
            .execute(conn)?)
        })?;
        Ok(updated == 1)
    }

    pub fn get_active_categories(&self) -> StoreResult<Vec<CategorySummary>> {
        self.db.run(|conn| {
            Ok(categories::table
                .filter(categories::state.eq(CategoryState::Active.as_str()))
                .select((categories::id, categories::name))
                .order(categories::id.asc())
                .load(conn)?)
        })
    }

    /// Deletes an unused category, or deprecates one that documents still
    /// reference. `None` if it does not exist or is already deleted.
    pub fn delete_category(&self, id: i32) -> StoreResult<Option<CategoryRemoval>> {
        let removal = self.db.serializable(|conn| {
            let Some(row) = categories::table
                .find(id)
                .first::<CategoryRow>(conn)
                .optional()?
            else {
                return Ok(None);
            };
            let category = Category::try_from(row)?;
            if category.state == CategoryState::Deleted {
                return Ok(None);
            }

            let references: i64 = documents::table
                .filter(documents::category.eq(id))
                .select(count_star())
                .first(conn)?;
            let next = if references > 0 {
                CategoryState::Deprecated
            } else {
                CategoryState::Deleted
            };

            diesel::update(categories::table.find(id))
                .set(categories::state.eq(next.as_str()))
                .execute(conn)?;

            Ok(Some(CategoryRemoval {
                name: category.name,
                deleted: next == CategoryState::Deleted,
            }))
        })?;

        if let Some(removal) = &removal {
            tracing::info!(category = id, deleted = removal.deleted, "removed category");
        }
        Ok(removal)
    }
}
