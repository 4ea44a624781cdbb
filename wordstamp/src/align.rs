use std::path::PathBuf;

use tracing::{debug, info, warn};
use whisper_rs::WhisperState;

use crate::audio::{secs_to_sample, WHISPER_SAMPLE_RATE};
use crate::config::{Model, Quantization};
use crate::error::{Error, Result};
use crate::model;
use crate::transcribe::{load_state, DecodeSettings};
use crate::types::{Segment, Word};

/// whisper.cpp refuses windows shorter than one second.
const MIN_WINDOW_SAMPLES: usize = WHISPER_SAMPLE_RATE as usize;

/// Word-level alignment of already transcribed segments.
pub trait Aligner {
    /// Return `segments` with `words` populated. Segment text and bounds are kept.
    fn align(&self, segments: &[Segment], samples: &[f32], language: &str) -> Result<Vec<Segment>>;
}

/// Run `aligner`, degrading to the unaligned segments on any error.
pub fn align_or_fallback(
    aligner: &dyn Aligner,
    segments: Vec<Segment>,
    samples: &[f32],
    language: &str,
) -> Vec<Segment> {
    info!("aligning word timestamps...");
    match aligner.align(&segments, samples, language) {
        Ok(aligned) => aligned,
        Err(e) => {
            warn!("alignment failed ({e}), using segment-level only");
            segments
        }
    }
}

/// Aligner that re-decodes each segment window with token timestamps.
///
/// The model is picked per language (see [`Model::alignment_variant`]) and
/// fetched lazily, so a missing or undownloadable alignment model surfaces as
/// an alignment error rather than failing the run.
#[derive(Debug, Clone)]
pub struct WhisperAligner {
    model: Model,
    quantization: Quantization,
    cache_dir: PathBuf,
    settings: DecodeSettings,
}

impl WhisperAligner {
    pub fn new(
        model: Model,
        quantization: Quantization,
        cache_dir: PathBuf,
        settings: DecodeSettings,
    ) -> Self {
        Self {
            model,
            quantization,
            cache_dir,
            settings,
        }
    }

    fn model_for(&self, language: &str) -> Result<PathBuf> {
        if whisper_rs::get_lang_id(language).is_none() {
            return Err(Error::Alignment(format!(
                "no alignment model for language \"{language}\""
            )));
        }
        let variant = self.model.alignment_variant(language);
        debug!(model = variant.name(), language, "alignment model");
        model::ensure_model(&variant, self.quantization, &self.cache_dir)
    }

    fn align_segment(
        &self,
        state: &mut WhisperState,
        segment: &Segment,
        samples: &[f32],
        language: &str,
    ) -> Result<Segment> {
        let mut aligned = Segment {
            words: Vec::new(),
            ..segment.clone()
        };

        let start = secs_to_sample(segment.start, samples.len());
        let end = secs_to_sample(segment.end, samples.len());
        if end <= start {
            return Ok(aligned);
        }

        let mut window = samples[start..end].to_vec();
        if window.len() < MIN_WINDOW_SAMPLES {
            window.resize(MIN_WINDOW_SAMPLES, 0.0);
        }

        let mut params = self.settings.full_params();
        params.set_language(Some(language));
        params.set_token_timestamps(true);
        params.set_no_context(true);
        params.set_single_segment(true);
        state.full(params, &window)?;

        let mut tokens = Vec::new();
        for i in 0..state.full_n_segments() {
            let Some(seg) = state.get_segment(i) else {
                continue;
            };
            for t in 0..seg.n_tokens() {
                let Some(token) = seg.get_token(t) else {
                    continue;
                };
                let Ok(text) = token.to_str_lossy() else {
                    continue;
                };
                let data = token.token_data();
                tokens.push(TimedToken {
                    text: text.into_owned(),
                    t0: data.t0 as f64 / 100.0,
                    t1: data.t1 as f64 / 100.0,
                    p: data.p as f64,
                });
            }
        }

        aligned.words = group_tokens(&tokens, segment.start, segment.end);
        Ok(aligned)
    }
}

impl Aligner for WhisperAligner {
    fn align(&self, segments: &[Segment], samples: &[f32], language: &str) -> Result<Vec<Segment>> {
        let model_path = self.model_for(language)?;
        let mut state = load_state(&model_path)
            .map_err(|e| Error::Alignment(format!("failed to load alignment model: {e}")))?;

        segments
            .iter()
            .map(|seg| self.align_segment(&mut state, seg, samples, language))
            .collect()
    }
}

/// A decoded token with times relative to its window start, in seconds.
#[derive(Debug, Clone)]
pub(crate) struct TimedToken {
    pub text: String,
    pub t0: f64,
    pub t1: f64,
    pub p: f64,
}

fn is_special(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with("[_") || trimmed.starts_with("<|")
}

struct PendingWord {
    text: String,
    start: f64,
    end: f64,
    p_sum: f64,
    n: usize,
}

impl PendingWord {
    fn finish(self) -> Option<Word> {
        let text = self.text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Word {
            word: text.to_string(),
            start: self.start,
            end: self.end.max(self.start),
            score: self.p_sum / self.n as f64,
        })
    }
}

/// Merge sub-word tokens into words placed inside `[seg_start, seg_end]`.
///
/// A token whose text begins with whitespace opens a new word.
pub(crate) fn group_tokens(tokens: &[TimedToken], seg_start: f64, seg_end: f64) -> Vec<Word> {
    let place = |t: f64| (seg_start + t).clamp(seg_start, seg_end.max(seg_start));

    let mut words = Vec::new();
    let mut current: Option<PendingWord> = None;

    for tok in tokens.iter().filter(|t| !is_special(&t.text)) {
        let opens_word = tok.text.starts_with(char::is_whitespace);
        if !opens_word {
            if let Some(word) = current.as_mut() {
                word.text.push_str(&tok.text);
                word.end = place(tok.t1);
                word.p_sum += tok.p;
                word.n += 1;
                continue;
            }
        }
        if let Some(word) = current.take().and_then(PendingWord::finish) {
            words.push(word);
        }
        current = Some(PendingWord {
            text: tok.text.clone(),
            start: place(tok.t0),
            end: place(tok.t1),
            p_sum: tok.p,
            n: 1,
        });
    }
    if let Some(word) = current.and_then(PendingWord::finish) {
        words.push(word);
    }
    words
}
