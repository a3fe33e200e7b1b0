use std::collections::HashSet;

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::{dsl::exists, prelude::*};
use serde::Serialize;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::models::{CategoryState, NewBarcode, NewBatch, NewDocument};
use crate::schema::{barcodes, batches, categories, documents};

/// Number of codes issued per batch.
pub const BATCH_SIZE: usize = 10;

const MAX_CODE_DRAWS: usize = BATCH_SIZE * 16;

/// Source of barcode values.
///
/// Codes must be unique across every batch ever issued, not just within one
/// batch. A repeat of a stored code aborts the batch with an invariant error.
pub trait CodeGenerator {
    fn generate(&mut self) -> Uuid;
}

/// Random version 4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodes;

impl CodeGenerator for RandomCodes {
    fn generate(&mut self) -> Uuid {
        Uuid::new_v4()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Batch {
    pub id: i32,
    pub office: i32,
    pub codes: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetiredBatch {
    pub discarded_codes: Vec<Uuid>,
    /// The batch row is gone and its id can be handed out again.
    pub released: bool,
}

#[derive(Clone)]
pub struct BatchIssuer {
    db: Database,
}

impl BatchIssuer {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Issues a batch of [`BATCH_SIZE`] codes under the smallest free batch id.
    pub fn generate_batch(
        &self,
        office: i32,
        generator: &mut dyn CodeGenerator,
    ) -> StoreResult<Batch> {
        let codes = draw_codes(generator)?;
        let now = self.db.now();

        let id = self.db.serializable(|conn| {
            let live: Vec<i32> = batches::table
                .select(batches::id)
                .order(batches::id.asc())
                .load(conn)?;
            let id = smallest_unused_id(&live)
                .ok_or_else(|| StoreError::invariant("batch id space exhausted"))?;

            diesel::insert_into(batches::table)
                .values(&NewBatch {
                    id,
                    office,
                    creation: now,
                })
                .execute(conn)?;

            let rows: Vec<NewBarcode> = codes
                .iter()
                .map(|&code| NewBarcode { code, batch: id })
                .collect();
            let inserted = diesel::insert_into(barcodes::table)
                .values(&rows)
                .execute(conn)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        StoreError::invariant("code generator repeated an issued code")
                    }
                    other => other.into(),
                })?;
            if inserted != BATCH_SIZE {
                return Err(StoreError::invariant(format!(
                    "inserted {inserted} codes for batch {id}"
                )));
            }
            Ok(id)
        })?;

        tracing::info!(office, batch = id, "issued barcode batch");
        Ok(Batch { id, office, codes })
    }

    /// Files a new document under `category` with `code` as its barcode.
    ///
    /// Returns `false` if the code is already bound, was never issued, or the
    /// category does not accept new documents.
    pub fn assign_barcode_to_document(
        &self,
        code: Uuid,
        category: i32,
        title: &str,
    ) -> StoreResult<bool> {
        let now = self.db.now();
        let outcome = self.db.serializable(|conn| {
            let issued =
                diesel::select(exists(barcodes::table.find(code))).get_result::<bool>(conn)?;
            if !issued {
                tracing::debug!(%code, "barcode was never issued");
                return Ok(false);
            }

            let bound = diesel::select(exists(
                documents::table.filter(documents::barcode.eq(code)),
            ))
            .get_result::<bool>(conn)?;
            if bound {
                tracing::debug!(%code, "barcode already bound");
                return Ok(false);
            }

            let state = categories::table
                .find(category)
                .select(categories::state)
                .first::<String>(conn)
                .optional()?;
            let state = state.map(|raw| raw.parse::<CategoryState>()).transpose()?;
            if state != Some(CategoryState::Active) {
                tracing::debug!(category, "category does not accept documents");
                return Ok(false);
            }

            diesel::insert_into(documents::table)
                .values(&NewDocument {
                    category,
                    title,
                    barcode: Some(code),
                    creation: now,
                })
                .execute(conn)?;
            Ok(true)
        });

        match outcome {
            Ok(true) => {
                tracing::info!(%code, category, "assigned barcode to document");
                Ok(true)
            }
            Err(StoreError::Database(DieselError::DatabaseError(
                DatabaseErrorKind::UniqueViolation,
                _,
            ))) => Ok(false),
            other => other,
        }
    }

    /// Discards the codes of batch `id` that no document uses. Once none of
    /// its codes are bound the batch itself is removed and its id is free.
    pub fn retire_batch(&self, id: i32) -> StoreResult<Option<RetiredBatch>> {
        let retired = self.db.serializable(|conn| {
            let found = batches::table
                .find(id)
                .select(batches::id)
                .first::<i32>(conn)
                .optional()?;
            if found.is_none() {
                return Ok(None);
            }

            let codes: Vec<Uuid> = barcodes::table
                .filter(barcodes::batch.eq(id))
                .select(barcodes::code)
                .load(conn)?;
            let bound: HashSet<Uuid> = documents::table
                .filter(documents::barcode.eq_any(&codes))
                .select(documents::barcode)
                .load::<Option<Uuid>>(conn)?
                .into_iter()
                .flatten()
                .collect();
            let discarded_codes: Vec<Uuid> = codes
                .into_iter()
                .filter(|code| !bound.contains(code))
                .collect();

            diesel::delete(barcodes::table.filter(barcodes::code.eq_any(&discarded_codes)))
                .execute(conn)?;

            let released = bound.is_empty();
            if released {
                diesel::delete(batches::table.find(id)).execute(conn)?;
            }

            Ok(Some(RetiredBatch {
                discarded_codes,
                released,
            }))
        })?;

        if let Some(retired) = &retired {
            tracing::info!(
                batch = id,
                discarded = retired.discarded_codes.len(),
                released = retired.released,
                "retired barcode batch"
            );
        }
        Ok(retired)
    }
}

/// Smallest positive integer missing from `sorted_ids`.
pub fn smallest_unused_id(sorted_ids: &[i32]) -> Option<i32> {
    let mut candidate = 1i32;
    for &id in sorted_ids {
        if id < candidate {
            continue;
        }
        if id > candidate {
            break;
        }
        candidate = candidate.checked_add(1)?;
    }
    Some(candidate)
}

fn draw_codes(generator: &mut dyn CodeGenerator) -> StoreResult<Vec<Uuid>> {
    let mut seen = HashSet::with_capacity(BATCH_SIZE);
    let mut codes = Vec::with_capacity(BATCH_SIZE);
    for _ in 0..MAX_CODE_DRAWS {
        if codes.len() == BATCH_SIZE {
            break;
        }
        let code = generator.generate();
        if seen.insert(code) {
            codes.push(code);
        }
    }

    if codes.len() < BATCH_SIZE {
        return Err(StoreError::invariant(format!(
            "code generator produced {} distinct codes in {MAX_CODE_DRAWS} draws",
            codes.len()
        )));
    }
    Ok(codes)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Cycle(u128, u128);

    impl CodeGenerator for Cycle {
        fn generate(&mut self) -> Uuid {
            self.0 = (self.0 + 1) % self.1;
            Uuid::from_u128(self.0)
        }
    }

    #[test]
    fn fills_the_first_gap() {
        assert_eq!(smallest_unused_id(&[]), Some(1));
        assert_eq!(smallest_unused_id(&[1, 2, 3]), Some(4));
        assert_eq!(smallest_unused_id(&[1, 2, 4, 5]), Some(3));
        assert_eq!(smallest_unused_id(&[2, 3]), Some(1));
        assert_eq!(smallest_unused_id(&[1, 3, 4, 7]), Some(2));
    }

    #[test]
    fn ignores_ids_past_the_first_gap() {
        assert_eq!(smallest_unused_id(&[i32::MAX - 1, i32::MAX]), Some(1));
        assert_eq!(smallest_unused_id(&[1, 2, i32::MAX]), Some(3));
    }

    #[test]
    fn draws_distinct_codes_despite_repeats() -> StoreResult<()> {
        let mut generator = Cycle(0, 12);
        let codes = draw_codes(&mut generator)?;
        assert_eq!(codes.len(), BATCH_SIZE);
        let unique: HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), BATCH_SIZE);
        Ok(())
    }

    #[test]
    fn rejects_generators_without_enough_variety() {
        let mut generator = Cycle(0, 3);
        assert!(matches!(
            draw_codes(&mut generator),
            Err(StoreError::Invariant(_))
        ));
    }

    #[test]
    fn random_codes_are_distinct() -> StoreResult<()> {
        let codes = draw_codes(&mut RandomCodes)?;
        assert_eq!(codes.iter().collect::<HashSet<_>>().len(), BATCH_SIZE);
        Ok(())
    }
}
