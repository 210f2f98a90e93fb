use serde::Serialize;
use uuid::Uuid;

use crate::models::job::JobStatus;

/// Response after submitting a label image for analysis.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub message: String,
}
