use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::locate;

/// Target sample rate for whisper.cpp.
pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Maximum audio duration in seconds (8 hours).
/// 8 hours at 16kHz mono f32 = ~1.8 GB.
const MAX_AUDIO_DURATION_SECS: f64 = 8.0 * 3600.0;

const MAX_AUDIO_SAMPLES: usize = MAX_AUDIO_DURATION_SECS as usize * WHISPER_SAMPLE_RATE as usize;

/// Longest ffmpeg stderr excerpt kept in an error message.
const MAX_STDERR_CHARS: usize = 1000;

/// Turns an audio file into 16kHz mono f32 samples.
pub trait AudioDecoder {
    fn decode(&self, path: &Path) -> Result<Vec<f32>>;
}

/// Decodes through an ffmpeg subprocess.
///
/// ffmpeg handles container parsing, resampling and downmixing in one shot.
/// When `ffmpeg_dir` is set the binary is spawned from there and the directory
/// is prepended to the child's `PATH`; the parent environment is untouched.
#[derive(Debug, Clone, Default)]
pub struct FfmpegDecoder {
    ffmpeg_dir: Option<PathBuf>,
}

impl FfmpegDecoder {
    pub fn new(ffmpeg_dir: Option<PathBuf>) -> Self {
        Self { ffmpeg_dir }
    }

    pub fn program(&self) -> PathBuf {
        locate::ffmpeg_program(self.ffmpeg_dir.as_deref())
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(self.program());
        if let Some(dir) = &self.ffmpeg_dir {
            if let Some(path) = locate::search_path_with(dir, std::env::var_os("PATH")) {
                cmd.env("PATH", path);
            }
        }
        cmd
    }
}

impl AudioDecoder for FfmpegDecoder {
    fn decode(&self, path: &Path) -> Result<Vec<f32>> {
        info!(path = %path.display(), "loading audio");

        if !path.exists() {
            return Err(Error::AudioNotFound {
                path: path.to_path_buf(),
            });
        }

        let mut child = self
            .command()
            .args(["-nostdin", "-threads", "0", "-i"])
            .arg(path)
            .args([
                "-f",
                "s16le",
                "-ac",
                "1",
                "-acodec",
                "pcm_s16le",
                "-ar",
                &WHISPER_SAMPLE_RATE.to_string(),
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::FfmpegNotFound {
                        program: self.program().display().to_string(),
                    }
                } else {
                    Error::AudioDecode(format!("failed to run ffmpeg: {e}"))
                }
            })?;

        // stderr drains on its own thread while stdout is read
        let stderr = child.stderr.take();
        let stderr_reader = std::thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_end(&mut buf);
            }
            String::from_utf8_lossy(&buf).into_owned()
        });

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::AudioDecode("ffmpeg stdout not captured".into()))?;
        let pcm = read_capped(stdout, MAX_AUDIO_SAMPLES)?;

        let samples = pcm_s16le_to_f32(&pcm);
        if let Err(e) = check_duration(samples.len()) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(e);
        }

        let status = child.wait()?;
        let stderr = stderr_reader.join().unwrap_or_default();

        if !status.success() {
            let tail: String = stderr.chars().take(MAX_STDERR_CHARS).collect();
            return Err(Error::AudioDecode(format!("ffmpeg failed: {tail}")));
        }

        if samples.is_empty() {
            return Err(Error::AudioDecode("ffmpeg produced no output".into()));
        }

        debug!(
            samples = samples.len(),
            duration_secs = format!("{:.1}", samples_to_secs(samples.len())),
            "decoded audio"
        );

        Ok(samples)
    }
}

/// Read s16le bytes, stopping one sample past `max_samples`.
pub(crate) fn read_capped(reader: impl Read, max_samples: usize) -> std::io::Result<Vec<u8>> {
    let cap = (max_samples as u64 + 1) * 2;
    let mut bytes = Vec::new();
    reader.take(cap).read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Convert s16le bytes to f32 samples normalized to [-1.0, 1.0].
/// A trailing odd byte is dropped.
pub(crate) fn pcm_s16le_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]) as f32 / 32768.0)
        .collect()
}

pub(crate) fn samples_to_secs(n: usize) -> f64 {
    n as f64 / WHISPER_SAMPLE_RATE as f64
}

/// Index of the sample at `secs`, clamped to `[0, len]`.
pub(crate) fn secs_to_sample(secs: f64, len: usize) -> usize {
    if !secs.is_finite() || secs <= 0.0 {
        return 0;
    }
    ((secs * WHISPER_SAMPLE_RATE as f64).round() as usize).min(len)
}

fn check_duration(n_samples: usize) -> Result<()> {
    let duration = samples_to_secs(n_samples);
    if duration > MAX_AUDIO_DURATION_SECS {
        return Err(Error::AudioDecode(format!(
            "audio too long ({duration:.0}s) — maximum supported duration is {MAX_AUDIO_DURATION_SECS:.0}s"
        )));
    }
    Ok(())
}
