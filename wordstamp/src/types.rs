use serde::{Deserialize, Serialize};

/// A single aligned word with timing and confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub word: String,
    pub start: f64,
    pub end: f64,
    pub score: f64,
}

/// A transcript segment (sentence/phrase).
///
/// `words` stays empty until the alignment pass fills it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub words: Vec<Word>,
}

impl Segment {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            words: Vec::new(),
        }
    }
}

/// Coarse transcription result: detected language plus segments.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcription {
    pub language: String,
    pub segments: Vec<Segment>,
}

/// One-line result record handed to the calling process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub status: String,
    pub language: String,
    pub word_count: usize,
    pub segment_count: usize,
    pub duration_s: f64,
    pub words_path: String,
    pub segments_path: String,
    pub vtt_path: String,
}
