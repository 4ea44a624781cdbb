use std::path::{Path, PathBuf};

use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, WhisperState};

use crate::config::{Language, TranscribeOptions};
use crate::error::{Error, Result};
use crate::types::{Segment, Transcription};

/// Coarse speech-to-text: segments with time bounds plus the detected language.
pub trait Transcriber {
    fn transcribe(&self, samples: &[f32], language: &Language) -> Result<Transcription>;
}

/// Decoding knobs shared by the transcription and alignment passes.
#[derive(Debug, Clone, Default)]
pub struct DecodeSettings {
    pub n_threads: Option<u32>,
    pub beam_size: Option<u32>,
    pub temperature: f32,
}

impl From<&TranscribeOptions> for DecodeSettings {
    fn from(options: &TranscribeOptions) -> Self {
        Self {
            n_threads: options.n_threads,
            beam_size: options.beam_size,
            temperature: options.temperature,
        }
    }
}

impl DecodeSettings {
    /// Whisper decoding params with console printing from whisper.cpp disabled.
    pub(crate) fn full_params<'a, 'b>(&self) -> FullParams<'a, 'b> {
        let mut params = match self.beam_size {
            Some(beam_size) => FullParams::new(SamplingStrategy::BeamSearch {
                beam_size: beam_size as i32,
                patience: -1.0,
            }),
            None => FullParams::new(SamplingStrategy::Greedy { best_of: 5 }),
        };

        params.set_temperature(self.temperature);
        if let Some(n) = self.n_threads {
            params.set_n_threads(n as i32);
        }

        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params
    }
}

/// Load a ggml model for CPU inference and create a decoding state.
pub(crate) fn load_state(model_path: &Path) -> Result<WhisperState> {
    info!(model = %model_path.display(), "loading whisper model");

    let mut ctx_params = WhisperContextParameters::new();
    ctx_params.use_gpu(false);

    let ctx = WhisperContext::new_with_params(
        model_path
            .to_str()
            .ok_or_else(|| Error::Model("model path contains invalid UTF-8".into()))?,
        ctx_params,
    )?;

    Ok(ctx.create_state()?)
}

/// Transcriber backed by a whisper.cpp model file.
#[derive(Debug)]
pub struct WhisperTranscriber {
    model_path: PathBuf,
    settings: DecodeSettings,
}

impl WhisperTranscriber {
    pub fn new(model_path: impl Into<PathBuf>, settings: DecodeSettings) -> Result<Self> {
        let model_path = model_path.into();
        if !model_path.exists() {
            return Err(Error::ModelNotFound { path: model_path });
        }
        Ok(Self {
            model_path,
            settings,
        })
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, samples: &[f32], language: &Language) -> Result<Transcription> {
        let mut state = load_state(&self.model_path)?;

        let mut params = self.settings.full_params();
        match language {
            Language::Auto => params.set_language(Some("auto")),
            Language::Code { code, .. } => params.set_language(Some(code.as_str())),
        }

        info!(samples = samples.len(), "running transcription");
        state.full(params, samples)?;

        let num_segments = state.full_n_segments();
        debug!(num_segments, "transcription complete");

        let mut segments = Vec::with_capacity(num_segments.max(0) as usize);
        for i in 0..num_segments {
            let segment = state
                .get_segment(i)
                .ok_or_else(|| Error::Transcription(format!("segment {i} not found")))?;

            let text = segment
                .to_str_lossy()
                .map_err(|e| Error::Transcription(format!("segment text error: {e}")))?
                .into_owned();

            segments.push(Segment::new(
                text,
                segment.start_timestamp() as f64 / 100.0,
                segment.end_timestamp() as f64 / 100.0,
            ));
        }

        let language = match language {
            Language::Code { code, .. } => code.clone(),
            Language::Auto => whisper_rs::get_lang_str(state.full_lang_id_from_state())
                .unwrap_or("unknown")
                .to_string(),
        };

        Ok(Transcription { language, segments })
    }
}
