use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShelfscanError {
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Video job not found: {id}")]
    NotFound { id: String },

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

impl ShelfscanError {
    /// Stable machine-readable code for API-layer callers.
    pub fn code(&self) -> &'static str {
        match self {
            ShelfscanError::Validation { .. } => "MISSING_REQUIRED_FIELD",
            ShelfscanError::NotFound { .. } => "VIDEO_NOT_FOUND",
            ShelfscanError::Process(_) | ShelfscanError::Pipeline(_) => "PROCESSING_ERROR",
            ShelfscanError::Database(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

/// Failures raised by the external collaborators (frame source, recognizer).
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Frame extraction failed: {0}")]
    FrameExtraction(String),

    #[error("Failed to read frame '{path}': {source}")]
    ReadFrame {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("OCR failed: {0}")]
    OcrFailed(String),
}

pub type Result<T> = std::result::Result<T, ShelfscanError>;
