//! File-backed job record store.
//!
//! One `<uuid>.json` document per job under a spool directory. The store is
//! an ephemeral cache, not a system of record: results only matter until the
//! client has polled them out, so records older than the retention window
//! are treated as absent and removed lazily on read or by the periodic
//! sweep. Single-process only; instances do not share spools.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::analysis::AnalysisResult;
use crate::models::job::{Job, JobStatus};

/// Partial update applied over an existing job record.
#[derive(Debug, Default, Clone)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub result: Option<AnalysisResult>,
    pub error: Option<String>,
}

impl JobPatch {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn completed(result: AnalysisResult) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            result: None,
            error: Some(message.into()),
        }
    }
}

/// Keyed store of [`Job`] documents with bounded retention.
pub struct JobStore {
    dir: PathBuf,
    retention: Duration,
    // Serializes read-modify-write so concurrent updates to one id cannot
    // interleave. Store-wide rather than per-id: update traffic is two or
    // three writes over a job's whole lifetime.
    update_lock: Mutex<()>,
}

impl JobStore {
    /// Open (creating if needed) the spool directory. An unwritable spool is
    /// fatal at startup.
    pub async fn open(dir: impl Into<PathBuf>, retention: Duration) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            retention,
            update_lock: Mutex::new(()),
        })
    }

    fn record_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn is_expired(&self, job: &Job) -> bool {
        Utc::now()
            .signed_duration_since(job.updated_at)
            .to_std()
            .map(|age| age > self.retention)
            .unwrap_or(false)
    }

    /// Write a fresh `pending` record for `id`. Write failure propagates and
    /// is fatal to the submission that triggered it.
    pub async fn create_job(&self, id: Uuid) -> Result<Job, StoreError> {
        let job = Job::new(id);
        self.write_record(&job).await?;
        Ok(job)
    }

    /// Merge `patch` over the current record and refresh `updated_at`.
    ///
    /// A no-op (with a warning) when the record is absent, expired, already
    /// terminal, or the patch would move the status backward. Absent records
    /// are never resurrected.
    pub async fn update_job(&self, id: Uuid, patch: JobPatch) -> Result<(), StoreError> {
        let _guard = self.update_lock.lock().await;

        let Some(mut job) = self.read_live(id).await else {
            tracing::warn!(job_id = %id, "update for unknown or expired job ignored");
            return Ok(());
        };

        if job.status.is_terminal() {
            tracing::warn!(job_id = %id, status = %job.status, "update for terminal job ignored");
            return Ok(());
        }
        if let Some(next) = patch.status {
            if next.rank() < job.status.rank() {
                tracing::warn!(
                    job_id = %id,
                    from = %job.status,
                    to = %next,
                    "backward status transition ignored"
                );
                return Ok(());
            }
            job.status = next;
        }
        if let Some(result) = patch.result {
            job.result = Some(result);
        }
        if let Some(error) = patch.error {
            job.error = Some(error);
        }
        // result and error are mutually exclusive once terminal
        match job.status {
            JobStatus::Completed => job.error = None,
            JobStatus::Failed => job.result = None,
            _ => {}
        }
        job.updated_at = Utc::now();

        self.write_record(&job).await
    }

    /// Fetch a job. Absent when never created, unreadable, unparseable, or
    /// older than the retention window; expired and corrupt entries are
    /// removed eagerly, best-effort.
    pub async fn get_job(&self, id: Uuid) -> Option<Job> {
        self.read_live(id).await
    }

    async fn read_live(&self, id: Uuid) -> Option<Job> {
        let path = self.record_path(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "unreadable job record treated as absent");
                return None;
            }
        };

        let job: Job = match serde_json::from_slice(&bytes) {
            Ok(job) => job,
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "corrupt job record removed");
                let _ = tokio::fs::remove_file(&path).await;
                return None;
            }
        };

        if self.is_expired(&job) {
            tracing::debug!(job_id = %id, "expired job record removed on read");
            let _ = tokio::fs::remove_file(&path).await;
            return None;
        }

        Some(job)
    }

    async fn write_record(&self, job: &Job) -> Result<(), StoreError> {
        let payload = serde_json::to_vec(job)?;
        // Write-then-rename keeps partially written documents invisible to
        // the sweep and to concurrent readers.
        let tmp = self.dir.join(format!("{}.json.tmp", job.id));
        tokio::fs::write(&tmp, &payload).await?;
        tokio::fs::rename(&tmp, self.record_path(job.id)).await?;
        Ok(())
    }

    /// Sweep the spool, removing expired and unparseable records. Idempotent;
    /// safe to run concurrently with create/update since each removal is a
    /// per-record read-then-conditionally-delete.
    pub async fn cleanup(&self) {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "job spool unreadable, skipping sweep");
                return;
            }
        };

        let mut live: u64 = 0;
        let mut removed: u64 = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let keep = match tokio::fs::read(&path).await {
                Ok(bytes) => match serde_json::from_slice::<Job>(&bytes) {
                    Ok(job) => !self.is_expired(&job),
                    Err(_) => false,
                },
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(_) => false,
            };

            if keep {
                live += 1;
            } else if tokio::fs::remove_file(&path).await.is_ok() {
                removed += 1;
            }
        }

        metrics::gauge!("analysis_jobs_stored").set(live as f64);
        if removed > 0 {
            tracing::debug!(removed, live, "swept job spool");
        }
    }

    /// Probe that the spool is writable (used by `/health`).
    pub async fn health_check(&self) -> Result<(), StoreError> {
        let probe = self.dir.join(".healthcheck");
        tokio::fs::write(&probe, b"ok").await?;
        tokio::fs::remove_file(&probe).await?;
        Ok(())
    }

    /// Start the periodic sweep task. The returned handle owns the task;
    /// dropping it leaves the task running for the process lifetime, and
    /// [`Sweeper::shutdown`] stops it deterministically.
    pub fn start_sweeper(self: Arc<Self>, period: Duration) -> Sweeper {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.cleanup().await;
            }
        });
        Sweeper { handle }
    }
}

/// Owned handle for the periodic sweep task.
pub struct Sweeper {
    handle: JoinHandle<()>,
}

impl Sweeper {
    pub fn shutdown(self) {
        self.handle.abort();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("job store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("job record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}
