//! Dedup intake
//!
//! Classifies every payload of a batch as new, duplicate or rejected. The
//! store's unique index on `business_id` is the final arbiter: a lookup miss
//! followed by a lost insert race is reported as a duplicate, never as a
//! second record.

use super::storage::{LabelStore, StorageError};
use chrono::Utc;
use shared::models::{BatchResult, LabelPayload, LabelRecord, RejectedPayload};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Batch contains no labels")]
    EmptyBatch,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type IntakeResult<T> = Result<T, IntakeError>;

#[derive(Clone)]
pub struct DedupIntake {
    store: Arc<dyn LabelStore>,
}

impl DedupIntake {
    pub fn new(store: Arc<dyn LabelStore>) -> Self {
        Self { store }
    }

    /// Classify and persist one batch
    ///
    /// Records stored before a storage failure stay stored; the failing call
    /// returns the error and no partial result.
    pub fn process(&self, submitted_by: Uuid, payloads: &[LabelPayload]) -> IntakeResult<BatchResult> {
        if payloads.is_empty() {
            return Err(IntakeError::EmptyBatch);
        }

        let mut new = Vec::new();
        let mut duplicates = Vec::new();
        let mut errors = Vec::new();

        for (index, payload) in payloads.iter().enumerate() {
            let (business_id, attributes) = match payload.normalize() {
                Ok(parts) => parts,
                Err(e) => {
                    tracing::debug!(index, error = %e, "Payload rejected");
                    errors.push(RejectedPayload {
                        index,
                        business_id: payload.business_id().map(str::to_string),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let now = Utc::now();
            if let Some(existing) = self.store.find_label_by_business_id(&business_id)? {
                tracing::debug!(business_id = %business_id, existing_id = %existing.internal_id, "Duplicate label");
                duplicates.push(LabelRecord::duplicate_of(&existing, attributes, submitted_by, now));
                continue;
            }

            let record = LabelRecord::new(business_id, attributes, submitted_by, now);
            match self.store.insert_label(&record) {
                Ok(()) => new.push(record),
                Err(StorageError::UniqueViolation(business_id)) => {
                    tracing::warn!(business_id = %business_id, "Lost insert race, classifying as duplicate");
                    let existing = self
                        .store
                        .find_label_by_business_id(&business_id)?
                        .ok_or_else(|| StorageError::UniqueViolation(business_id.clone()))?;
                    duplicates.push(LabelRecord::duplicate_of(
                        &existing,
                        record.attributes,
                        submitted_by,
                        now,
                    ));
                }
                Err(e) => return Err(e.into()),
            }
        }

        let result = BatchResult::from_parts(new, duplicates, errors);
        tracing::info!(
            batch_size = payloads.len(),
            new_count = result.new_count,
            duplicate_count = result.duplicate_count,
            error_count = result.error_count,
            "Batch classified"
        );
        Ok(result)
    }
}
