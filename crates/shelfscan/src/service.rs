//! Service surface consumed by the upload/API layer.
//!
//! `VideoService` owns the job store handle and the pipeline, and exposes the
//! operations an HTTP layer would map to endpoints: create (which schedules a
//! detached processing run), status, results, and delete. All collaborators
//! are injected through the constructor; there is no ambient singleton.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::db::job_repo::{self, JobRow};
use crate::db::result_repo::{self, ResultRow};
use crate::db::{now_rfc3339, Database};
use crate::error::{Result, ShelfscanError};
use crate::frames::FrameSource;
use crate::job::{percentage, JobStatus};
use crate::ocr::TextRecognizer;
use crate::pipeline::Pipeline;

/// Descriptor of an uploaded video handed over by the upload layer.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
    /// Media type reported by the uploader; detected from the path if absent.
    pub mime_type: Option<String>,
}

/// Query options for `get_results`.
#[derive(Debug, Clone, Copy)]
pub struct ResultsQuery {
    /// Minimum confidence score, inclusive.
    pub min_confidence: f64,
    /// Maximum number of results returned.
    pub limit: u32,
}

impl Default for ResultsQuery {
    fn default() -> Self {
        Self {
            min_confidence: 0.0,
            limit: 50,
        }
    }
}

/// Status view returned to pollers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub id: String,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub frame_count: u32,
    pub processed_frames: u32,
    pub percentage: u8,
}

/// Result listing returned for one job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsView {
    pub video_id: String,
    pub total_results: usize,
    pub results: Vec<ResultView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultView {
    pub id: String,
    pub frame_number: u32,
    pub recognized_text: String,
    pub confidence_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<serde_json::Value>,
    pub language: String,
    pub is_book_title: bool,
    pub created_at: String,
}

impl From<ResultRow> for ResultView {
    fn from(row: ResultRow) -> Self {
        Self {
            id: row.id,
            frame_number: row.frame_number,
            recognized_text: row.recognized_text,
            confidence_score: row.confidence_score,
            bounding_box: row
                .bounding_box
                .as_deref()
                .and_then(|json| serde_json::from_str(json).ok()),
            language: row.language,
            is_book_title: row.is_book_title,
            created_at: row.created_at,
        }
    }
}

#[derive(Clone)]
pub struct VideoService {
    db: Database,
    pipeline: Pipeline,
}

impl VideoService {
    pub fn new(
        db: Database,
        frame_source: Arc<dyn FrameSource>,
        recognizer: Arc<dyn TextRecognizer>,
    ) -> Self {
        let pipeline = Pipeline::new(db.clone(), frame_source, recognizer);
        Self { db, pipeline }
    }

    /// Creates a PENDING job for an uploaded video and schedules its
    /// processing run as a detached task.
    ///
    /// The caller gets the stored job back immediately; it never waits for
    /// (or observes) pipeline completion. Errors from the detached run are
    /// logged and become visible to callers only as a FAILED status.
    ///
    /// Must be called from within a tokio runtime.
    pub fn create_job(&self, file: UploadedFile) -> Result<JobRow> {
        if file.filename.trim().is_empty() || file.path.as_os_str().is_empty() {
            return Err(ShelfscanError::Validation {
                message: "video file is required".to_string(),
            });
        }

        let mime_type = file.mime_type.clone().or_else(|| {
            mime_guess::from_path(&file.path)
                .first()
                .map(|m| m.to_string())
        });

        let now = now_rfc3339();
        let job = JobRow {
            id: Uuid::new_v4().to_string(),
            filename: file.filename,
            source_path: file.path.display().to_string(),
            file_size: file.size,
            mime_type,
            status: JobStatus::Pending,
            frame_count: 0,
            processed_frames: 0,
            error_message: None,
            created_at: now.clone(),
            updated_at: now,
        };
        job_repo::insert(&self.db, &job)?;

        let pipeline = self.pipeline.clone();
        let job_id = job.id.clone();
        tokio::spawn(async move {
            if let Err(e) = pipeline.run(&job_id).await {
                tracing::error!(job_id = %job_id, error = %e, "video processing failed");
            }
        });

        Ok(job)
    }

    /// Returns the status and progress of a job.
    pub fn get_status(&self, id: &str) -> Result<JobStatusView> {
        let job = self.require_job(id)?;
        Ok(JobStatusView {
            id: job.id,
            status: job.status,
            progress: JobProgress {
                frame_count: job.frame_count,
                processed_frames: job.processed_frames,
                percentage: percentage(job.processed_frames, job.frame_count),
            },
            created_at: job.created_at,
            updated_at: job.updated_at,
        })
    }

    /// Returns the persisted results for a job, threshold-filtered and
    /// ordered by creation time ascending.
    pub fn get_results(&self, id: &str, query: ResultsQuery) -> Result<ResultsView> {
        self.require_job(id)?;
        let rows = result_repo::find_by_job(&self.db, id, query.min_confidence, query.limit)?;
        let results: Vec<ResultView> = rows.into_iter().map(ResultView::from).collect();
        Ok(ResultsView {
            video_id: id.to_string(),
            total_results: results.len(),
            results,
        })
    }

    /// Deletes a job: its results first, then the job record, then the
    /// uploaded source file (best effort).
    pub fn delete_job(&self, id: &str) -> Result<()> {
        let job = self.require_job(id)?;

        let removed = result_repo::delete_by_job(&self.db, id)?;
        job_repo::delete(&self.db, id)?;
        debug!(job_id = %id, removed, "deleted job and results");

        let source = Path::new(&job.source_path);
        if source.exists() {
            if let Err(e) = std::fs::remove_file(source) {
                tracing::warn!(
                    job_id = %id,
                    error = %e,
                    "failed to remove uploaded file during job deletion"
                );
            }
        }

        Ok(())
    }

    fn require_job(&self, id: &str) -> Result<JobRow> {
        job_repo::find_by_id(&self.db, id)?.ok_or_else(|| ShelfscanError::NotFound {
            id: id.to_string(),
        })
    }
}
