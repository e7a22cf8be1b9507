//! Batch intake results

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::label::LabelRecord;
use super::print_job::{DispatchReport, JobSnapshot};

/// A payload excluded from intake, with its position in the submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedPayload {
    pub index: usize,
    pub business_id: Option<String>,
    pub reason: String,
}

/// Classification of one submitted batch
///
/// Every submitted payload lands in exactly one of `new`, `duplicates` or
/// `errors`, so the counts always add up to `total_processed`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub new: Vec<LabelRecord>,
    pub duplicates: Vec<LabelRecord>,
    pub errors: Vec<RejectedPayload>,
    pub total_processed: usize,
    pub new_count: usize,
    pub duplicate_count: usize,
    pub error_count: usize,
}

impl BatchResult {
    pub fn from_parts(
        new: Vec<LabelRecord>,
        duplicates: Vec<LabelRecord>,
        errors: Vec<RejectedPayload>,
    ) -> Self {
        let (new_count, duplicate_count, error_count) = (new.len(), duplicates.len(), errors.len());
        Self {
            new,
            duplicates,
            errors,
            total_processed: new_count + duplicate_count + error_count,
            new_count,
            duplicate_count,
            error_count,
        }
    }

    pub fn is_reconciled(&self) -> bool {
        self.new_count == self.new.len()
            && self.duplicate_count == self.duplicates.len()
            && self.error_count == self.errors.len()
            && self.new_count + self.duplicate_count + self.error_count == self.total_processed
    }
}

/// A new record that was stored but could not be rendered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderFailure {
    pub label_id: Uuid,
    pub business_id: String,
    pub reason: String,
}

/// Everything a batch submission produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSubmission {
    #[serde(flatten)]
    pub result: BatchResult,
    /// Jobs created for the new records, in creation order
    pub jobs: Vec<JobSnapshot>,
    pub render_failures: Vec<RenderFailure>,
    /// Present when the new jobs were dispatched right away
    pub dispatch: Option<DispatchReport>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::label::LabelAttributes;
    use chrono::Utc;

    #[test]
    fn test_counts_follow_parts() {
        let now = Utc::now();
        let user = Uuid::new_v4();
        let fresh = LabelRecord::new("A", LabelAttributes::default(), user, now);
        let dup = LabelRecord::duplicate_of(&fresh, LabelAttributes::default(), user, now);
        let rejected = RejectedPayload {
            index: 2,
            business_id: None,
            reason: "ID is required".into(),
        };

        let result = BatchResult::from_parts(vec![fresh], vec![dup], vec![rejected]);
        assert_eq!(result.new_count, 1);
        assert_eq!(result.duplicate_count, 1);
        assert_eq!(result.error_count, 1);
        assert_eq!(result.total_processed, 3);
        assert!(result.is_reconciled());
    }

    #[test]
    fn test_empty_batch_is_reconciled() {
        let result = BatchResult::from_parts(vec![], vec![], vec![]);
        assert_eq!(result.total_processed, 0);
        assert!(result.is_reconciled());
    }
}
