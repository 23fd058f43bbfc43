use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The job record disappeared before the detached run could load it.
    #[error("Video job not found: {0}")]
    JobNotFound(String),

    #[error("Frame processing failed: {0}")]
    Process(#[from] crate::error::ProcessError),

    #[error("Job store failed: {0}")]
    Database(#[from] crate::db::DatabaseError),
}
