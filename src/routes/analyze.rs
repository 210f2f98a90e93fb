use axum::extract::{Multipart, Path, State};
use axum::Json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::api::SubmitResponse;
use crate::models::job::{Job, JobStatus};
use crate::routes::error::ApiError;
use crate::services::analysis;
use crate::store::JobPatch;

/// POST /api/v1/analyze — Upload a nutrition label image for analysis.
///
/// Creates the job, flips it to `processing`, and detaches the pipeline; the
/// response carries the job id and never waits on the analysis itself.
pub async fn submit_analysis(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SubmitResponse>, ApiError> {
    let mut image_data: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::bad_request("malformed multipart body"))?
    {
        if field.name() == Some("image") {
            let data = field
                .bytes()
                .await
                .map_err(|_| ApiError::bad_request("could not read image field"))?;

            image::guess_format(&data)
                .map_err(|_| ApiError::unsupported_media_type("unrecognized image format"))?;

            image_data = Some(data.to_vec());
        }
    }

    let image_data = image_data.ok_or_else(|| ApiError::bad_request("no image field in request"))?;

    metrics::counter!("analysis_jobs_total").increment(1);

    let job = state
        .store
        .create_job(Uuid::new_v4())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to create job record");
            ApiError::internal("could not create analysis job")
        })?;

    state
        .store
        .update_job(job.id, JobPatch::status(JobStatus::Processing))
        .await
        .map_err(|e| {
            tracing::error!(job_id = %job.id, error = %e, "failed to mark job processing");
            ApiError::internal("could not start analysis job")
        })?;

    tracing::info!(job_id = %job.id, bytes = image_data.len(), "analysis job submitted");

    spawn_analysis(state, job.id, image_data);

    Ok(Json(SubmitResponse {
        job_id: job.id,
        status: JobStatus::Processing,
        message: "label submitted for analysis".to_string(),
    }))
}

/// Detach the pipeline for one job. The terminal state always lands in the
/// store: pipeline errors are mapped to `failed` here, and a watcher task
/// records panics, since nothing upstream awaits the worker.
fn spawn_analysis(state: AppState, job_id: Uuid, image_data: Vec<u8>) {
    let worker = tokio::spawn({
        let state = state.clone();
        async move {
            let started = std::time::Instant::now();
            let outcome =
                analysis::analyze_image(&state.inference, &state.references, &image_data).await;
            metrics::histogram!("analysis_processing_seconds")
                .record(started.elapsed().as_secs_f64());

            let patch = match outcome {
                Ok(result) => {
                    metrics::counter!("analysis_jobs_completed").increment(1);
                    tracing::info!(
                        job_id = %job_id,
                        ingredients = result.ingredients.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "analysis complete"
                    );
                    JobPatch::completed(result)
                }
                Err(e) => {
                    metrics::counter!("analysis_jobs_failed").increment(1);
                    tracing::warn!(job_id = %job_id, error = %e, "analysis failed");
                    JobPatch::failed(e.to_string())
                }
            };

            if let Err(e) = state.store.update_job(job_id, patch).await {
                tracing::error!(job_id = %job_id, error = %e, "failed to record analysis outcome");
            }
        }
    });

    tokio::spawn(async move {
        if let Err(e) = worker.await {
            if e.is_panic() {
                metrics::counter!("analysis_jobs_failed").increment(1);
                tracing::error!(job_id = %job_id, "analysis task panicked");
                if let Err(e) = state
                    .store
                    .update_job(job_id, JobPatch::failed("analysis task panicked"))
                    .await
                {
                    tracing::error!(job_id = %job_id, error = %e, "failed to record panic outcome");
                }
            }
        }
    });
}

/// GET /api/v1/analyze/{job_id} — Fetch the current job record.
///
/// 404 is terminal for the poller: the job never existed or has expired out
/// of the retention window.
pub async fn get_analysis_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Job>, ApiError> {
    match state.store.get_job(job_id).await {
        Some(job) => Ok(Json(job)),
        None => Err(ApiError::not_found("analysis job not found or expired")),
    }
}
