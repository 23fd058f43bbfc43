//! Frame extraction from uploaded videos.
//!
//! `FrameSource` is the collaborator seam; `FfmpegFrameSource` is the
//! production implementation and shells out to the `ffmpeg` binary. Extracted
//! frame images are temporary artifacts owned by the pipeline run that
//! created them and removed by `cleanup_frames` when the run reaches a
//! terminal state.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::ProcessError;

/// One still image sampled from the source video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameDescriptor {
    /// Ordinal position within the job, starting at 0.
    pub frame_number: u32,
    /// Location of the sampled image.
    pub path: PathBuf,
    /// Location of the source video the frame was sampled from.
    pub original_path: PathBuf,
}

#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Produces the ordered frame list for a video, or an extraction error
    /// for unreadable/corrupt input.
    async fn extract(&self, video_path: &Path) -> Result<Vec<FrameDescriptor>, ProcessError>;
}

/// Samples frames by running `ffmpeg` as a child process.
pub struct FfmpegFrameSource {
    frame_dir: PathBuf,
    interval_seconds: u32,
    max_frames: u32,
}

impl FfmpegFrameSource {
    pub const DEFAULT_INTERVAL_SECONDS: u32 = 1;
    pub const DEFAULT_MAX_FRAMES: u32 = 15;

    pub fn new(frame_dir: impl Into<PathBuf>) -> Self {
        Self::with_limits(
            frame_dir,
            Self::DEFAULT_INTERVAL_SECONDS,
            Self::DEFAULT_MAX_FRAMES,
        )
    }

    pub fn with_limits(
        frame_dir: impl Into<PathBuf>,
        interval_seconds: u32,
        max_frames: u32,
    ) -> Self {
        Self {
            frame_dir: frame_dir.into(),
            interval_seconds: interval_seconds.max(1),
            max_frames: max_frames.max(1),
        }
    }
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    async fn extract(&self, video_path: &Path) -> Result<Vec<FrameDescriptor>, ProcessError> {
        tokio::fs::create_dir_all(&self.frame_dir)
            .await
            .map_err(|e| {
                ProcessError::FrameExtraction(format!(
                    "failed to create frame directory '{}': {}",
                    self.frame_dir.display(),
                    e
                ))
            })?;

        let stem = video_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "frame".to_string());
        let pattern = self.frame_dir.join(format!("{}-%04d.png", stem));

        let output = Command::new("ffmpeg")
            .arg("-hide_banner")
            .args(["-loglevel", "error"])
            .arg("-y")
            .arg("-i")
            .arg(video_path)
            .args(["-vf", &format!("fps=1/{}", self.interval_seconds)])
            .args(["-frames:v", &self.max_frames.to_string()])
            .arg(&pattern)
            .output()
            .await
            .map_err(|e| {
                ProcessError::FrameExtraction(format!("failed to spawn ffmpeg: {}", e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.trim();
            return Err(ProcessError::FrameExtraction(if detail.is_empty() {
                format!("ffmpeg exited with {}", output.status)
            } else {
                detail.to_string()
            }));
        }

        let frames = self.collect_frames(&stem, video_path)?;
        tracing::info!(total_frames = frames.len(), "frame extraction completed");
        Ok(frames)
    }
}

impl FfmpegFrameSource {
    /// Lists the images ffmpeg produced for this video, in sequence order
    /// (the `%04d` pattern makes lexicographic order the frame order).
    fn collect_frames(
        &self,
        stem: &str,
        video_path: &Path,
    ) -> Result<Vec<FrameDescriptor>, ProcessError> {
        let prefix = format!("{}-", stem);
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.frame_dir)
            .map_err(|e| {
                ProcessError::FrameExtraction(format!(
                    "failed to list frame directory '{}': {}",
                    self.frame_dir.display(),
                    e
                ))
            })?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .map(|name| {
                        let name = name.to_string_lossy();
                        name.starts_with(&prefix) && name.ends_with(".png")
                    })
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        Ok(paths
            .into_iter()
            .enumerate()
            .map(|(index, path)| FrameDescriptor {
                frame_number: index as u32,
                path,
                original_path: video_path.to_path_buf(),
            })
            .collect())
    }
}

/// Best-effort removal of temporary frame images. Frames whose path equals
/// the original video location are never touched. Failures are logged and
/// never escalated.
pub fn cleanup_frames(frames: &[FrameDescriptor]) {
    for frame in frames {
        if frame.path == frame.original_path {
            continue;
        }
        if !frame.path.exists() {
            continue;
        }
        if let Err(e) = std::fs::remove_file(&frame.path) {
            tracing::warn!(
                frame = frame.frame_number,
                path = %frame.path.display(),
                error = %e,
                "failed to cleanup frame file"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let source = FfmpegFrameSource::new("/tmp/frames");
        assert_eq!(source.interval_seconds, 1);
        assert_eq!(source.max_frames, 15);
    }

    #[test]
    fn test_limits_are_floored_at_one() {
        let source = FfmpegFrameSource::with_limits("/tmp/frames", 0, 0);
        assert_eq!(source.interval_seconds, 1);
        assert_eq!(source.max_frames, 1);
    }

    #[test]
    fn test_cleanup_removes_only_temporary_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("shelf.mp4");
        let frame = dir.path().join("shelf-0001.png");
        std::fs::write(&video, b"video").unwrap();
        std::fs::write(&frame, b"png").unwrap();

        cleanup_frames(&[
            FrameDescriptor {
                frame_number: 0,
                path: frame.clone(),
                original_path: video.clone(),
            },
            // Stub descriptor pointing at the video itself must be left alone.
            FrameDescriptor {
                frame_number: 1,
                path: video.clone(),
                original_path: video.clone(),
            },
        ]);

        assert!(!frame.exists());
        assert!(video.exists());
    }

    #[test]
    fn test_cleanup_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        cleanup_frames(&[FrameDescriptor {
            frame_number: 0,
            path: dir.path().join("gone.png"),
            original_path: dir.path().join("shelf.mp4"),
        }]);
    }

    #[tokio::test]
    async fn test_extract_fails_for_missing_video() {
        let dir = tempfile::tempdir().unwrap();
        let source = FfmpegFrameSource::new(dir.path().join("frames"));
        let result = source.extract(&dir.path().join("missing.mp4")).await;
        // Either ffmpeg is absent (spawn failure) or it rejects the input;
        // both must surface as a frame extraction error.
        assert!(matches!(result, Err(ProcessError::FrameExtraction(_))));
    }
}
