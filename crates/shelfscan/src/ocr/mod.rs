//! Text recognition over extracted frames.
//!
//! `TextRecognizer` is the collaborator seam; `TesseractRecognizer` is the
//! production implementation. Confidence values cross this boundary in the
//! recognizer's native scale and are normalized to [0, 1] here.

use std::io::Cursor;
use std::path::Path;

use async_trait::async_trait;

use crate::error::ProcessError;
use crate::frames::FrameDescriptor;

/// A single recognized word with its confidence and opaque geometry.
#[derive(Debug, Clone)]
pub struct WordObservation {
    pub text: String,
    pub confidence: f64,
    /// Bounding geometry as reported by the recognizer; no schema enforced.
    pub bbox: Option<serde_json::Value>,
}

/// The output of applying text recognition to one frame.
#[derive(Debug, Clone)]
pub struct RecognitionPayload {
    pub frame_number: u32,
    /// Combined recognized text, trimmed. Empty when the frame had no text.
    pub text: String,
    /// Overall confidence in the recognizer's native scale, if reported.
    pub confidence: Option<f64>,
    /// Overall language tag, if the recognizer reports one.
    pub language: Option<String>,
    pub words: Vec<WordObservation>,
}

/// Normalizes a recognizer confidence to the closed interval [0, 1].
///
/// Values above 1 are assumed to be percentage-scale and divided by 100,
/// then clamped; absent values map to 0. The scale detection is a documented
/// heuristic: a recognizer genuinely reporting 1.0 on a 0-100 scale passes
/// through unchanged.
pub fn normalize_confidence(value: Option<f64>) -> f64 {
    let Some(raw) = value else {
        return 0.0;
    };
    let scaled = if raw > 1.0 { raw / 100.0 } else { raw };
    scaled.clamp(0.0, 1.0)
}

#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, frame: &FrameDescriptor) -> Result<RecognitionPayload, ProcessError>;
}

/// Tesseract-backed recognizer (leptess).
pub struct TesseractRecognizer {
    languages: String,
}

impl TesseractRecognizer {
    /// Creates a recognizer for the given Tesseract language packs.
    /// Defaults to `jpn+eng` (book spines are the primary workload).
    pub fn new(languages: &[String]) -> Self {
        let languages = if languages.is_empty() {
            "jpn+eng".to_string()
        } else {
            languages.join("+")
        };
        Self { languages }
    }
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    async fn recognize(&self, frame: &FrameDescriptor) -> Result<RecognitionPayload, ProcessError> {
        let languages = self.languages.clone();
        let path = frame.path.clone();
        let frame_number = frame.frame_number;

        // leptess is blocking; keep it off the async runtime.
        tokio::task::spawn_blocking(move || recognize_blocking(&languages, &path, frame_number))
            .await
            .map_err(|e| ProcessError::OcrFailed(format!("OCR task panicked: {}", e)))?
    }
}

fn recognize_blocking(
    languages: &str,
    path: &Path,
    frame_number: u32,
) -> Result<RecognitionPayload, ProcessError> {
    let _span = tracing::info_span!("ocr.recognize", frame = frame_number).entered();

    let image_data = std::fs::read(path).map_err(|e| ProcessError::ReadFrame {
        path: path.to_path_buf(),
        source: e,
    })?;

    // Load image
    let img = image::load_from_memory(&image_data)
        .map_err(|e| ProcessError::OcrFailed(format!("Failed to load image: {}", e)))?;

    // Convert to PNG in memory for leptess
    let mut png_data = Vec::new();
    let mut cursor = Cursor::new(&mut png_data);
    img.write_to(&mut cursor, image::ImageFormat::Png)
        .map_err(|e| ProcessError::OcrFailed(format!("Failed to convert image: {}", e)))?;

    // Create Tesseract instance
    let mut lt = leptess::LepTess::new(None, languages)
        .map_err(|e| ProcessError::OcrFailed(format!("Failed to initialize Tesseract: {}", e)))?;

    lt.set_image_from_mem(&png_data)
        .map_err(|e| ProcessError::OcrFailed(format!("Failed to set image for OCR: {}", e)))?;

    let text = lt
        .get_utf8_text()
        .map_err(|e| ProcessError::OcrFailed(format!("OCR failed: {}", e)))?
        .trim()
        .to_string();

    // Tesseract reports mean confidence on a 0-100 scale.
    let confidence = normalize_confidence(Some(lt.mean_text_conf() as f64));

    // Word-level observations come from the TSV renderer. Losing them is
    // tolerable (candidate scoring falls back to the overall confidence),
    // so a TSV failure does not fail the frame.
    let words = match lt.get_tsv_text(0) {
        Ok(tsv) => parse_tsv_words(&tsv),
        Err(e) => {
            tracing::warn!(frame = frame_number, error = %e, "word-level TSV unavailable");
            Vec::new()
        }
    };

    Ok(RecognitionPayload {
        frame_number,
        text,
        confidence: Some(confidence),
        language: Some(languages.to_string()),
        words,
    })
}

/// Parses Tesseract TSV output into word observations.
///
/// Columns: level, page_num, block_num, par_num, line_num, word_num, left,
/// top, width, height, conf, text. Level 5 rows are words; conf is 0-100,
/// with -1 marking non-text rows.
fn parse_tsv_words(tsv: &str) -> Vec<WordObservation> {
    let mut words = Vec::new();
    for line in tsv.lines() {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let (Ok(left), Ok(top), Ok(width), Ok(height), Ok(conf)) = (
            cols[6].parse::<i64>(),
            cols[7].parse::<i64>(),
            cols[8].parse::<i64>(),
            cols[9].parse::<i64>(),
            cols[10].parse::<f64>(),
        ) else {
            continue;
        };
        let text = cols[11].trim();
        if text.is_empty() || conf < 0.0 {
            continue;
        }
        words.push(WordObservation {
            text: text.to_string(),
            confidence: normalize_confidence(Some(conf)),
            bbox: Some(serde_json::json!({
                "x0": left,
                "y0": top,
                "x1": left + width,
                "y1": top + height,
            })),
        });
    }
    words
}
