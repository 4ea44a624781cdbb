use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use wordstamp::{Language, Model, Quantization, TranscribeOptions};

/// Prefix of every human-readable progress line on stdout.
const LOG_PREFIX: &str = "[whisperx]";

#[derive(Parser)]
#[command(
    name = "wordstamp",
    about = "Transcribe an audio file into word-aligned JSON and WebVTT"
)]
struct Cli {
    /// Path to the input audio file.
    #[arg(required_unless_present_any = ["list_models", "download_model", "list_languages"])]
    input: Option<PathBuf>,

    /// Output directory; artifacts go to <OUTPUT_DIR>/whisperx/.
    #[arg(required_unless_present_any = ["list_models", "download_model", "list_languages"])]
    output_dir: Option<PathBuf>,

    /// Whisper model size, or a path to a ggml model file.
    #[arg(short, long, default_value = "base")]
    model: String,

    /// Language code (e.g. "en", "de"); auto-detected when omitted.
    #[arg(short, long)]
    language: Option<String>,

    /// Model weight precision: f16, q8_0 (int8), q5_1, q5_0.
    #[arg(long, default_value = "q8_0")]
    quantization: String,

    /// Number of threads (default: auto).
    #[arg(long)]
    threads: Option<u32>,

    /// Beam search size (default: greedy).
    #[arg(long)]
    beam_size: Option<u32>,

    /// Sampling temperature.
    #[arg(long, default_value = "0.0")]
    temperature: f32,

    /// Skip word alignment and write segment-level output only.
    #[arg(long)]
    no_align: bool,

    /// Model cache directory.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Directory containing the ffmpeg binary.
    #[arg(long)]
    ffmpeg_dir: Option<PathBuf>,

    /// List available models.
    #[arg(long)]
    list_models: bool,

    /// Download a model without transcribing.
    #[arg(long)]
    download_model: Option<String>,

    /// List supported languages.
    #[arg(long)]
    list_languages: bool,
}

/// Renders events as `[whisperx] message key=value`, warnings flagged.
struct ProgressFormat;

impl<S, N> FormatEvent<S, N> for ProgressFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(writer, "{LOG_PREFIX} ")?;
        let level = *event.metadata().level();
        if level == Level::WARN {
            write!(writer, "WARNING: ")?;
        } else if level == Level::ERROR {
            write!(writer, "ERROR: ")?;
        }
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Plain-text subscriber for the progress stream; stdout is usually a pipe.
fn progress_subscriber<W>(filter: EnvFilter, make_writer: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .event_format(ProgressFormat)
        .with_writer(make_writer)
        .finish()
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::from_default_env().add_directive("wordstamp=info".parse().unwrap());
    progress_subscriber(filter, std::io::stdout).init();

    if cli.list_languages {
        println!("{:<6} LANGUAGE", "CODE");
        println!("{:<6} --------", "----");
        for (code, name) in Language::supported() {
            println!("{code:<6} {name}");
        }
        return ExitCode::SUCCESS;
    }

    if cli.list_models {
        list_models(cli.cache_dir);
        return ExitCode::SUCCESS;
    }

    if let Some(model_name) = &cli.download_model {
        let Some(quantization) = parse_quantization(&cli.quantization) else {
            return ExitCode::FAILURE;
        };
        let Some(model) = Model::parse_name(model_name) else {
            eprintln!("ERROR: Unknown model: {model_name}");
            eprintln!("Use --list-models to see available models");
            return ExitCode::FAILURE;
        };
        let cache_dir = cli
            .cache_dir
            .unwrap_or_else(|| TranscribeOptions::default().resolve_cache_dir());
        return match wordstamp::model::ensure_model(&model, quantization, &cache_dir) {
            Ok(path) => {
                println!("Model ready: {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("ERROR: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let (Some(input), Some(output_dir)) = (cli.input, cli.output_dir) else {
        eprintln!("ERROR: input and output_dir are required");
        return ExitCode::FAILURE;
    };

    if !input.exists() {
        eprintln!("ERROR: Input file not found: {}", input.display());
        return ExitCode::FAILURE;
    }

    let Some(quantization) = parse_quantization(&cli.quantization) else {
        return ExitCode::FAILURE;
    };

    let model = match Model::parse_name(&cli.model) {
        Some(m) => m,
        None => {
            // Try as custom model path
            let path = PathBuf::from(&cli.model);
            if path.exists() {
                Model::Custom(path)
            } else {
                eprintln!("ERROR: Unknown model: {}", cli.model);
                eprintln!("Use --list-models to see available models, or provide a path to a ggml file");
                return ExitCode::FAILURE;
            }
        }
    };

    let opts = match build_options(cli.language.as_deref(), cli.threads, cli.beam_size, cli.temperature) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("ERROR: {e}");
            if matches!(e, wordstamp::Error::UnsupportedLanguage(_)) {
                eprintln!("Use --list-languages to see supported languages");
            }
            return ExitCode::FAILURE;
        }
    };

    let mut opts = opts
        .model(model)
        .quantization(quantization)
        .align(!cli.no_align);
    if let Some(dir) = cli.cache_dir {
        opts = opts.cache_dir(dir);
    }
    if let Some(dir) = cli.ffmpeg_dir {
        opts = opts.ffmpeg_dir(dir);
    }

    let summary = match wordstamp::transcribe_to_dir(&input, &output_dir, &opts) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("ERROR: {e}");
            return ExitCode::FAILURE;
        }
    };

    match summary.result_line() {
        Ok(line) => {
            println!();
            println!("{line}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("ERROR: {e}");
            ExitCode::FAILURE
        }
    }
}

fn parse_quantization(name: &str) -> Option<Quantization> {
    let quantization = Quantization::parse_name(name);
    if quantization.is_none() {
        eprintln!("ERROR: Unknown quantization: {name}");
        eprintln!("Use one of: f16, q8_0, q5_1, q5_0");
    }
    quantization
}

fn build_options(
    language: Option<&str>,
    threads: Option<u32>,
    beam_size: Option<u32>,
    temperature: f32,
) -> wordstamp::Result<TranscribeOptions> {
    let mut opts = TranscribeOptions::new().temperature(temperature)?;
    if let Some(lang) = language {
        opts = opts.language(lang)?;
    }
    if let Some(n) = threads {
        opts = opts.n_threads(n)?;
    }
    if let Some(size) = beam_size {
        opts = opts.beam_size(size)?;
    }
    Ok(opts)
}

fn list_models(cache_dir: Option<PathBuf>) {
    let models = [
        ("tiny", "75 MB"),
        ("tiny.en", "75 MB"),
        ("base", "142 MB"),
        ("base.en", "142 MB"),
        ("small", "466 MB"),
        ("small.en", "466 MB"),
        ("medium", "1.5 GB"),
        ("medium.en", "1.5 GB"),
        ("large-v1", "2.9 GB"),
        ("large-v2", "2.9 GB"),
        ("large-v3", "2.9 GB"),
        ("large-v3-turbo", "~1.6 GB"),
    ];
    println!("{:<16} SIZE (f16)", "MODEL");
    println!("{:<16} ----------", "-----");
    for (name, size) in models {
        println!("{name:<16} {size}");
    }

    let cache_dir = cache_dir.unwrap_or_else(|| TranscribeOptions::default().resolve_cache_dir());
    let cached = wordstamp::model::list_cached_models(&cache_dir);
    if !cached.is_empty() {
        println!("\nCached models in {}:", cache_dir.display());
        for path in cached {
            let size = std::fs::metadata(&path)
                .map(|m| format_bytes(m.len()))
                .unwrap_or_default();
            println!(
                "  {} ({})",
                path.file_name()
                    .map(|f| f.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                size
            );
        }
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_000_000_000 {
        format!("{:.1} GB", bytes as f64 / 1_000_000_000.0)
    } else if bytes >= 1_000_000 {
        format!("{:.0} MB", bytes as f64 / 1_000_000.0)
    } else {
        format!("{:.0} KB", bytes as f64 / 1_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing::{info, warn};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn test_progress_lines_are_plain_text() {
        let buf = SharedBuf::default();
        let writer = buf.clone();
        let subscriber = progress_subscriber(EnvFilter::new("info"), move || writer.clone());

        tracing::subscriber::with_default(subscriber, || {
            info!(model = "/m/ggml-base-q8_0.bin", "loading whisper model");
            warn!("alignment failed ({}), using segment-level only", "no model");
        });

        assert_eq!(
            buf.contents(),
            "[whisperx] loading whisper model model=\"/m/ggml-base-q8_0.bin\"\n\
             [whisperx] WARNING: alignment failed (no model), using segment-level only\n"
        );
        assert!(!buf.contents().contains('\x1b'));
    }

    #[test]
    fn test_progress_errors_are_flagged() {
        let buf = SharedBuf::default();
        let writer = buf.clone();
        let subscriber = progress_subscriber(EnvFilter::new("info"), move || writer.clone());

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("hidden");
            tracing::error!("decode failed");
        });

        assert_eq!(buf.contents(), "[whisperx] ERROR: decode failed\n");
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_positional_and_flags() {
        let cli = Cli::try_parse_from([
            "wordstamp",
            "call.wav",
            "out",
            "--model",
            "small",
            "--language",
            "de",
        ])
        .unwrap();
        assert_eq!(cli.input, Some(PathBuf::from("call.wav")));
        assert_eq!(cli.output_dir, Some(PathBuf::from("out")));
        assert_eq!(cli.model, "small");
        assert_eq!(cli.language.as_deref(), Some("de"));
        assert_eq!(cli.quantization, "q8_0");
        assert!(!cli.no_align);
    }

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["wordstamp", "call.wav", "out"]).unwrap();
        assert_eq!(cli.model, "base");
        assert_eq!(cli.language, None);
    }

    #[test]
    fn test_output_dir_required() {
        assert!(Cli::try_parse_from(["wordstamp", "call.wav"]).is_err());
    }

    #[test]
    fn test_list_models_needs_no_input() {
        let cli = Cli::try_parse_from(["wordstamp", "--list-models"]).unwrap();
        assert!(cli.list_models);
        assert!(cli.input.is_none());
    }

    #[test]
    fn test_build_options_validation() {
        assert!(build_options(None, Some(0), None, 0.0).is_err());
        assert!(build_options(None, None, None, -1.0).is_err());
        assert!(build_options(Some("klingon"), None, None, 0.0).is_err());

        let opts = build_options(Some("en"), Some(4), Some(5), 0.0).unwrap();
        assert_eq!(opts.language.code(), Some("en"));
        assert_eq!(opts.n_threads, Some(4));
        assert_eq!(opts.beam_size, Some(5));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(2_900_000_000), "2.9 GB");
        assert_eq!(format_bytes(142_000_000), "142 MB");
        assert_eq!(format_bytes(75_000), "75 KB");
    }
}
