use std::path::Path;

use tracing::info;

use crate::align::{self, Aligner};
use crate::audio::AudioDecoder;
use crate::config::Language;
use crate::error::{Error, Result};
use crate::output;
use crate::transcribe::Transcriber;
use crate::types::Summary;

/// Fail fast on a missing input before any model or output work happens.
pub fn check_input(input: &Path) -> Result<()> {
    if input.exists() {
        Ok(())
    } else {
        Err(Error::AudioNotFound {
            path: input.to_path_buf(),
        })
    }
}

/// Decode, transcribe, align and write, one step after another.
///
/// `aligner = None` skips the alignment pass; the output is then the same
/// segment-only shape a failed alignment produces.
pub fn run(
    input: &Path,
    output_dir: &Path,
    language: &Language,
    decoder: &dyn AudioDecoder,
    transcriber: &dyn Transcriber,
    aligner: Option<&dyn Aligner>,
) -> Result<Summary> {
    check_input(input)?;

    let samples = decoder.decode(input)?;

    info!(
        "transcribing: {}",
        input
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default()
    );
    let transcription = transcriber.transcribe(&samples, language)?;
    info!("detected language: {}", transcription.language);

    let segments = match aligner {
        Some(aligner) => align::align_or_fallback(
            aligner,
            transcription.segments,
            &samples,
            &transcription.language,
        ),
        None => {
            info!("alignment skipped, using segment-level only");
            transcription.segments
        }
    };

    output::write_outputs(&segments, &transcription.language, output_dir)
}
