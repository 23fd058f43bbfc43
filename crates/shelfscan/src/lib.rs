pub mod db;
pub mod error;
pub mod frames;
pub mod job;
pub mod ocr;
pub mod pipeline;
pub mod service;
pub mod telemetry;
pub mod titles;

pub use db::Database;
pub use error::{ProcessError, Result, ShelfscanError};
pub use frames::{cleanup_frames, FfmpegFrameSource, FrameDescriptor, FrameSource};
pub use job::{percentage, JobStatus};
pub use ocr::{
    normalize_confidence, RecognitionPayload, TesseractRecognizer, TextRecognizer, WordObservation,
};
pub use pipeline::{Pipeline, PipelineError};
pub use service::{ResultsQuery, UploadedFile, VideoService};
pub use titles::{extract_candidates, TitleCandidate};
