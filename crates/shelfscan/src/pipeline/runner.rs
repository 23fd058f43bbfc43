use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

use crate::db::job_repo::{self, JobRow};
use crate::db::result_repo::{self, ResultRow};
use crate::db::{now_rfc3339, Database};
use crate::frames::{self, FrameDescriptor, FrameSource};
use crate::ocr::{normalize_confidence, RecognitionPayload, TextRecognizer};
use crate::titles::{self, TitleCandidate};

use super::error::PipelineError;

/// Drives one job from PENDING through PROCESSING to a terminal state.
///
/// Collaborators are injected explicitly; tests substitute stub frame sources
/// and recognizers through `new`. One `Pipeline` instance handles one job per
/// `run` call; concurrent jobs run as independent detached tasks over clones.
#[derive(Clone)]
pub struct Pipeline {
    db: Database,
    frame_source: Arc<dyn FrameSource>,
    recognizer: Arc<dyn TextRecognizer>,
}

impl Pipeline {
    pub fn new(
        db: Database,
        frame_source: Arc<dyn FrameSource>,
        recognizer: Arc<dyn TextRecognizer>,
    ) -> Self {
        Self {
            db,
            frame_source,
            recognizer,
        }
    }

    /// Runs the full pipeline for one job.
    ///
    /// On any failure after the job was loaded, the job is moved to FAILED
    /// with the failure's message before the error propagates to the caller
    /// (the detached scheduling task, which logs it). Temporary frame
    /// artifacts are cleaned up after the terminal state is recorded,
    /// success or failure.
    pub async fn run(&self, job_id: &str) -> Result<(), PipelineError> {
        let span = info_span!("pipeline", job_id = %job_id);
        self.run_traced(job_id).instrument(span).await
    }

    async fn run_traced(&self, job_id: &str) -> Result<(), PipelineError> {
        let job = job_repo::find_by_id(&self.db, job_id)?
            .ok_or_else(|| PipelineError::JobNotFound(job_id.to_string()))?;

        let mut frames: Vec<FrameDescriptor> = Vec::new();
        let result = self.run_steps(&job, &mut frames).await;

        if let Err(e) = &result {
            tracing::error!(error = %e, "video processing failed");
            if let Err(store_err) = job_repo::mark_failed(&self.db, &job.id, &e.to_string(), &now_rfc3339()) {
                // The terminal state could not be recorded; the failure is
                // then only visible through logs.
                tracing::error!(error = %store_err, "failed to record FAILED status");
            }
        }

        frames::cleanup_frames(&frames);
        result
    }

    async fn run_steps(
        &self,
        job: &JobRow,
        frames: &mut Vec<FrameDescriptor>,
    ) -> Result<(), PipelineError> {
        job_repo::mark_processing(&self.db, &job.id, &now_rfc3339())?;

        *frames = self
            .frame_source
            .extract(Path::new(&job.source_path))
            .instrument(info_span!("extract_frames"))
            .await?;
        job_repo::set_frame_count(&self.db, &job.id, frames.len() as u32, &now_rfc3339())?;

        let mut pending: Vec<ResultRow> = Vec::new();
        let mut processed: u32 = 0;

        // Strictly sequential: frame N completes (including its progress
        // write) before frame N+1 starts, so polled progress is monotonic.
        for frame in frames.iter() {
            let payload = self
                .recognizer
                .recognize(frame)
                .instrument(info_span!("recognize_frame", frame = frame.frame_number))
                .await?;

            let candidates = titles::extract_candidates(&payload);
            let best = select_best(&candidates);

            if let Some(row) = build_result(&job.id, &payload, best) {
                pending.push(row);
            }

            processed += 1;
            job_repo::set_processed_frames(&self.db, &job.id, processed, &now_rfc3339())?;
        }

        if !pending.is_empty() {
            let count = result_repo::insert_many(&self.db, &pending)?;
            debug!(count, "persisted recognition results");
        }

        job_repo::mark_completed(&self.db, &job.id, frames.len() as u32, &now_rfc3339())?;
        Ok(())
    }
}

/// Picks the candidate with the maximum confidence. The comparison is strict,
/// so the earliest of equal maxima wins (stable reduce).
fn select_best(candidates: &[TitleCandidate]) -> Option<&TitleCandidate> {
    let mut best: Option<&TitleCandidate> = None;
    for candidate in candidates {
        match best {
            Some(current) if candidate.confidence <= current.confidence => {}
            _ => best = Some(candidate),
        }
    }
    best
}

/// Builds the pending result for one frame, or `None` when recognition
/// produced no text.
fn build_result(
    job_id: &str,
    payload: &RecognitionPayload,
    best: Option<&TitleCandidate>,
) -> Option<ResultRow> {
    if payload.text.is_empty() {
        return None;
    }

    let confidence_score = match best {
        Some(candidate) => candidate.confidence,
        None => normalize_confidence(payload.confidence),
    };
    let language = best
        .map(|c| c.language.clone())
        .or_else(|| payload.language.clone())
        .unwrap_or_else(|| "unknown".to_string());
    let bounding_box = best
        .and_then(|c| c.bbox.as_ref())
        .map(|value| value.to_string());

    Some(ResultRow {
        id: Uuid::new_v4().to_string(),
        job_id: job_id.to_string(),
        frame_number: payload.frame_number,
        recognized_text: payload.text.clone(),
        confidence_score,
        bounding_box,
        language,
        is_book_title: best.is_some(),
        created_at: now_rfc3339(),
    })
}
