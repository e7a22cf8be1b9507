//! Label pipeline types

use serde::Serialize;
use uuid::Uuid;

/// Domain event broadcast by the pipeline
///
/// Consumed by audit and reporting collaborators; nothing inside the
/// pipeline depends on anyone listening.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    BatchProcessed {
        submitted_by: Uuid,
        total: usize,
        new_count: usize,
        duplicate_count: usize,
        error_count: usize,
    },
    JobCreated {
        job_id: Uuid,
        label_id: Uuid,
    },
    JobCompleted {
        job_id: Uuid,
    },
    JobFailed {
        job_id: Uuid,
        reason: String,
    },
    JobRetried {
        job_id: Uuid,
        retry_count: u32,
        retried_by: Uuid,
    },
    RetryExhausted {
        job_id: Uuid,
        max_retries: u32,
    },
    /// A job stuck in `dispatching` was forced to `failed`
    JobReconciled {
        job_id: Uuid,
        reason: String,
    },
}

impl PipelineEvent {
    /// Job the event is about, if any
    pub fn job_id(&self) -> Option<Uuid> {
        match self {
            Self::BatchProcessed { .. } => None,
            Self::JobCreated { job_id, .. }
            | Self::JobCompleted { job_id }
            | Self::JobFailed { job_id, .. }
            | Self::JobRetried { job_id, .. }
            | Self::RetryExhausted { job_id, .. }
            | Self::JobReconciled { job_id, .. } => Some(*job_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let job_id = Uuid::new_v4();
        let event = PipelineEvent::JobFailed {
            job_id,
            reason: "Timeout: 10.0.0.9:9100".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "job_failed");
        assert_eq!(json["job_id"], job_id.to_string());
        assert_eq!(event.job_id(), Some(job_id));
    }
}
