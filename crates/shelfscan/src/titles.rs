//! Title candidate extraction from a single frame's recognition payload.
//!
//! Pure and deterministic: the same payload always yields the same candidate
//! list, in line order.

use serde::Serialize;

use crate::ocr::{normalize_confidence, RecognitionPayload, WordObservation};

/// A line of recognized text considered as a possible book title.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleCandidate {
    pub text: String,
    /// Mean of the payload's word confidences, each normalized to [0, 1],
    /// rounded to 2 decimal places. Falls back to the payload's overall
    /// confidence when no words were observed.
    pub confidence: f64,
    pub language: String,
    /// Geometry for the candidate when the recognizer ties words to lines.
    /// Line candidates currently carry none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<serde_json::Value>,
}

/// Derives ranked title candidates from one recognition payload.
///
/// Every trimmed, non-empty line of at least 3 characters becomes a
/// candidate. When no line passes the filter but the text is non-empty, a
/// single fallback candidate is built from the whole trimmed text. The result
/// is empty only for empty input text.
pub fn extract_candidates(payload: &RecognitionPayload) -> Vec<TitleCandidate> {
    let confidence = mean_word_confidence(&payload.words)
        .unwrap_or_else(|| normalize_confidence(payload.confidence));

    let mut candidates: Vec<TitleCandidate> = payload
        .text
        .replace('\r', "")
        .split('\n')
        .map(str::trim)
        .filter(|line| line.chars().count() >= 3)
        .map(|line| TitleCandidate {
            text: line.to_string(),
            confidence,
            language: detect_language(line).to_string(),
            bbox: None,
        })
        .collect();

    if candidates.is_empty() && !payload.text.is_empty() {
        let text = payload.text.trim().to_string();
        let language = detect_language(&text).to_string();
        candidates.push(TitleCandidate {
            text,
            confidence,
            language,
            bbox: None,
        });
    }

    candidates
}

/// Coarse character-range heuristic: any Hiragana, Katakana, or CJK unified
/// ideograph classifies the line as "ja", everything else as "en". A known
/// limitation, not a full language model.
fn detect_language(text: &str) -> &'static str {
    let has_japanese = text.chars().any(|c| {
        matches!(c,
            '\u{3041}'..='\u{3093}'   // Hiragana ぁ-ん
            | '\u{30A1}'..='\u{30F3}' // Katakana ァ-ン
            | '\u{4E00}'..='\u{9FA0}' // CJK 一-龠
        )
    });
    if has_japanese {
        "ja"
    } else {
        "en"
    }
}

/// Word confidences arrive in the recognizer's native scale; each one is
/// normalized to [0, 1] before averaging. `None` when there are no words.
fn mean_word_confidence(words: &[WordObservation]) -> Option<f64> {
    if words.is_empty() {
        return None;
    }
    let total: f64 = words
        .iter()
        .map(|w| normalize_confidence(Some(w.confidence)))
        .sum();
    Some(round2(total / words.len() as f64))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
