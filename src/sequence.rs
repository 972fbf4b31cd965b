//! Human-readable reference allocation.
//!
//! References look like `MOV-20260217-0001`: a prefix, the day, and a
//! counter that is monotonic per (prefix, day) and unique overall. The
//! allocator is an injected service so embedders can swap in their own
//! numbering scheme; the default implementation keeps one counter row per
//! (prefix, day) and increments it inside the caller's transaction.

use crate::db;
use crate::entities::reference_sequence::{self, Entity as ReferenceSequence};
use crate::errors::ServiceError;
use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    QueryFilter, QuerySelect, Set,
};

pub const MOVEMENT_PREFIX: &str = "MOV";
pub const TRANSFER_PREFIX: &str = "TRF";
pub const INVENTORY_PREFIX: &str = "INV";

#[async_trait]
pub trait ReferenceAllocator: Send + Sync {
    /// Allocates the next reference for a prefix and day, inside the
    /// caller's transaction so an aborted operation never burns a gap into
    /// the committed sequence.
    async fn next_reference(
        &self,
        txn: &DatabaseTransaction,
        prefix: &str,
        date: NaiveDate,
    ) -> Result<String, ServiceError>;
}

pub(crate) fn format_reference(prefix: &str, day: &str, sequence: i64) -> String {
    format!("{}-{}-{:04}", prefix, day, sequence)
}

/// Database-backed allocator over the `reference_sequences` table.
#[derive(Debug, Default, Clone, Copy)]
pub struct DbReferenceAllocator;

#[async_trait]
impl ReferenceAllocator for DbReferenceAllocator {
    async fn next_reference(
        &self,
        txn: &DatabaseTransaction,
        prefix: &str,
        date: NaiveDate,
    ) -> Result<String, ServiceError> {
        let day = date.format("%Y%m%d").to_string();

        let mut query = ReferenceSequence::find()
            .filter(reference_sequence::Column::Prefix.eq(prefix))
            .filter(reference_sequence::Column::Day.eq(day.as_str()));
        if db::supports_row_locks(txn.get_database_backend()) {
            query = query.lock_exclusive();
        }

        let existing = query.one(txn).await.map_err(ServiceError::db_error)?;

        let next = match existing {
            Some(row) => {
                let next = row.last_value + 1;
                let mut active: reference_sequence::ActiveModel = row.into();
                active.last_value = Set(next);
                active.update(txn).await.map_err(ServiceError::db_error)?;
                next
            }
            None => {
                let row = reference_sequence::ActiveModel {
                    prefix: Set(prefix.to_string()),
                    day: Set(day.clone()),
                    last_value: Set(1),
                    ..Default::default()
                };
                row.insert(txn).await.map_err(ServiceError::db_error)?;
                1
            }
        };

        Ok(format_reference(prefix, &day, next))
    }
}
