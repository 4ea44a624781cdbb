//! Audio file in, word-aligned transcript out.
//!
//! **wordstamp** runs the full pipeline: locating ffmpeg, decoding audio to
//! 16 kHz mono, transcribing with whisper.cpp, aligning word timestamps, and
//! writing three artifacts under `<output_dir>/whisperx/`:
//!
//! - `words.json`: every aligned word `{word, start, end, score}`
//! - `segments.json`: segments `{text, start, end, words}`
//! - `transcript.vtt`: WebVTT subtitles
//!
//! Alignment is best-effort. If it fails, the run still succeeds with
//! segment-level output only.
//!
//! # Quick start
//!
//! ```rust,no_run
//! # fn main() -> wordstamp::Result<()> {
//! let opts = wordstamp::TranscribeOptions::new().language("en")?;
//! let summary = wordstamp::transcribe_to_dir("call.wav", "out", &opts)?;
//! println!("{}", summary.result_line()?);
//! # Ok(())
//! # }
//! ```

pub mod align;
pub mod audio;
pub mod config;
pub mod error;
pub mod locate;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod transcribe;
pub mod types;

pub use align::{Aligner, WhisperAligner};
pub use audio::{AudioDecoder, FfmpegDecoder};
pub use config::{Language, Model, Quantization, TranscribeOptions};
pub use error::{Error, Result};
pub use locate::FfmpegLocator;
pub use transcribe::{DecodeSettings, Transcriber, WhisperTranscriber};
pub use types::{Segment, Summary, Transcription, Word};

use std::path::Path;

use tracing::{info, warn};

/// Transcribe `input` and write the artifacts under `output_dir`.
pub fn transcribe_to_dir(
    input: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    options: &TranscribeOptions,
) -> Result<Summary> {
    let input = input.as_ref();
    pipeline::check_input(input)?;

    let locator = FfmpegLocator::platform_default().with_explicit_dir(options.ffmpeg_dir.clone());
    let ffmpeg_dir = locator.locate();
    match &ffmpeg_dir {
        Some(dir) => info!("ffmpeg: {}", dir.display()),
        None => warn!("ffmpeg not found via WinGet, hoping it's on PATH"),
    }
    let decoder = FfmpegDecoder::new(ffmpeg_dir);

    info!(
        "model={}, device=cpu, compute={}",
        options.model.name(),
        options.quantization.name()
    );
    let cache_dir = options.resolve_cache_dir();
    let model_path = model::ensure_model(&options.model, options.quantization, &cache_dir)?;
    let settings = DecodeSettings::from(options);
    let transcriber = WhisperTranscriber::new(model_path, settings.clone())?;

    let aligner = options.align.then(|| {
        WhisperAligner::new(options.model.clone(), options.quantization, cache_dir, settings)
    });

    pipeline::run(
        input,
        output_dir.as_ref(),
        &options.language,
        &decoder,
        &transcriber,
        aligner.as_ref().map(|a| a as &dyn Aligner),
    )
}
