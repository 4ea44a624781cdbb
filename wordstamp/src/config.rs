use std::fmt;
use std::path::PathBuf;

use crate::error::Error;

/// A validated language for whisper transcription.
///
/// Wraps a language code that has been verified against whisper.cpp's
/// supported language list. Accepts both short codes ("en", "de")
/// and full names ("english", "german").
///
/// Use `Language::Auto` for automatic detection, or `Language::new("en")` for
/// a specific language.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Language {
    /// Auto-detect language from audio.
    #[default]
    Auto,
    /// A validated language code (e.g. "en", "de", "ja").
    Code {
        /// Short code as whisper expects it.
        code: String,
        /// Whisper internal language ID.
        id: i32,
    },
}

impl Language {
    /// Create a language from a code or full name, validating against whisper.cpp.
    pub fn new(lang: &str) -> Result<Self, Error> {
        let lower = lang.trim().to_lowercase();
        if lower == "auto" {
            return Ok(Language::Auto);
        }

        match whisper_rs::get_lang_id(&lower) {
            Some(id) => {
                let code = whisper_rs::get_lang_str(id).unwrap_or(&lower).to_string();
                Ok(Language::Code { code, id })
            }
            None => Err(Error::UnsupportedLanguage(lang.to_string())),
        }
    }

    /// Get the short language code (e.g. "en"), or None for Auto.
    pub fn code(&self) -> Option<&str> {
        match self {
            Language::Auto => None,
            Language::Code { code, .. } => Some(code),
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Language::Auto)
    }

    /// List all supported languages as (code, full_name) pairs.
    pub fn supported() -> Vec<(&'static str, &'static str)> {
        let max = whisper_rs::get_lang_max_id();
        (0..=max)
            .filter_map(|id| {
                let code = whisper_rs::get_lang_str(id)?;
                let name = whisper_rs::get_lang_str_full(id)?;
                Some((code, name))
            })
            .collect()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Auto => write!(f, "auto"),
            Language::Code { code, .. } => write!(f, "{code}"),
        }
    }
}

/// Weight precision of a whisper.cpp model file.
///
/// Quantized files trade a little accuracy for a much smaller footprint and
/// faster CPU inference. `Q8_0` is the int8 variant and the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Quantization {
    F16,
    #[default]
    Q8_0,
    Q5_1,
    Q5_0,
}

impl Quantization {
    /// Filename suffix used by the whisper.cpp model repository.
    pub fn suffix(&self) -> Option<&'static str> {
        match self {
            Quantization::F16 => None,
            Quantization::Q8_0 => Some("q8_0"),
            Quantization::Q5_1 => Some("q5_1"),
            Quantization::Q5_0 => Some("q5_0"),
        }
    }

    pub fn name(&self) -> &'static str {
        self.suffix().unwrap_or("f16")
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "f16" | "fp16" | "float16" => Some(Quantization::F16),
            "q8_0" | "int8" => Some(Quantization::Q8_0),
            "q5_1" => Some(Quantization::Q5_1),
            "q5_0" => Some(Quantization::Q5_0),
            _ => None,
        }
    }
}

/// Whisper model sizes.
#[derive(Debug, Clone, PartialEq)]
pub enum Model {
    Tiny,
    TinyEn,
    Base,
    BaseEn,
    Small,
    SmallEn,
    Medium,
    MediumEn,
    LargeV1,
    LargeV2,
    LargeV3,
    LargeV3Turbo,
    /// User-provided ggml file path. Used as-is, quantization is ignored.
    Custom(PathBuf),
}

impl Model {
    /// Model filename as published in the whisper.cpp HuggingFace repository.
    pub fn filename(&self, quantization: Quantization) -> String {
        if let Model::Custom(path) = self {
            return path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| "custom-model".into());
        }
        match quantization.suffix() {
            Some(suffix) => format!("ggml-{}-{suffix}.bin", self.name()),
            None => format!("ggml-{}.bin", self.name()),
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        match self {
            Model::Tiny => "tiny",
            Model::TinyEn => "tiny.en",
            Model::Base => "base",
            Model::BaseEn => "base.en",
            Model::Small => "small",
            Model::SmallEn => "small.en",
            Model::Medium => "medium",
            Model::MediumEn => "medium.en",
            Model::LargeV1 => "large-v1",
            Model::LargeV2 => "large-v2",
            Model::LargeV3 => "large-v3",
            Model::LargeV3Turbo => "large-v3-turbo",
            Model::Custom(_) => "custom",
        }
    }

    /// Parse from string (e.g. CLI argument).
    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "tiny" => Some(Model::Tiny),
            "tiny.en" => Some(Model::TinyEn),
            "base" => Some(Model::Base),
            "base.en" => Some(Model::BaseEn),
            "small" => Some(Model::Small),
            "small.en" => Some(Model::SmallEn),
            "medium" => Some(Model::Medium),
            "medium.en" => Some(Model::MediumEn),
            "large-v1" => Some(Model::LargeV1),
            "large-v2" => Some(Model::LargeV2),
            "large" | "large-v3" => Some(Model::LargeV3),
            "large-v3-turbo" | "turbo" => Some(Model::LargeV3Turbo),
            _ => None,
        }
    }

    /// Model used to align words for `language`.
    ///
    /// English audio is aligned with the English-only sibling where one is
    /// published; every other language reuses the transcription model.
    pub fn alignment_variant(&self, language: &str) -> Model {
        if language != "en" {
            return self.clone();
        }
        match self {
            Model::Tiny => Model::TinyEn,
            Model::Base => Model::BaseEn,
            Model::Small => Model::SmallEn,
            Model::Medium => Model::MediumEn,
            other => other.clone(),
        }
    }
}

/// Builder for transcription options.
#[derive(Debug, Clone)]
pub struct TranscribeOptions {
    pub model: Model,
    pub quantization: Quantization,
    pub language: Language,
    pub n_threads: Option<u32>,
    pub beam_size: Option<u32>,
    pub temperature: f32,
    /// Run the word alignment pass.
    pub align: bool,
    pub cache_dir: Option<PathBuf>,
    /// Directory holding the ffmpeg binary; overrides the install-tree scan.
    pub ffmpeg_dir: Option<PathBuf>,
}

impl Default for TranscribeOptions {
    fn default() -> Self {
        Self {
            model: Model::Base,
            quantization: Quantization::default(),
            language: Language::Auto,
            n_threads: None,
            beam_size: None,
            temperature: 0.0,
            align: true,
            cache_dir: None,
            ffmpeg_dir: None,
        }
    }
}

impl TranscribeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }

    pub fn quantization(mut self, quantization: Quantization) -> Self {
        self.quantization = quantization;
        self
    }

    /// Set the language. Validates against whisper's supported languages.
    pub fn language(mut self, lang: &str) -> Result<Self, Error> {
        self.language = Language::new(lang)?;
        Ok(self)
    }

    pub fn n_threads(mut self, n: u32) -> Result<Self, Error> {
        if n == 0 {
            return Err(Error::InvalidOption("thread count must be at least 1".into()));
        }
        self.n_threads = Some(n);
        Ok(self)
    }

    pub fn beam_size(mut self, size: u32) -> Result<Self, Error> {
        if size == 0 {
            return Err(Error::InvalidOption("beam size must be at least 1".into()));
        }
        self.beam_size = Some(size);
        Ok(self)
    }

    pub fn temperature(mut self, temp: f32) -> Result<Self, Error> {
        if !temp.is_finite() || temp < 0.0 {
            return Err(Error::InvalidOption(format!(
                "temperature must be a non-negative number, got {temp}"
            )));
        }
        self.temperature = temp;
        Ok(self)
    }

    pub fn align(mut self, enabled: bool) -> Self {
        self.align = enabled;
        self
    }

    pub fn cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache_dir = Some(dir);
        self
    }

    pub fn ffmpeg_dir(mut self, dir: PathBuf) -> Self {
        self.ffmpeg_dir = Some(dir);
        self
    }

    /// Resolve the cache directory, defaulting to ~/.cache/wordstamp/models.
    pub fn resolve_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from(".cache"))
                .join("wordstamp")
                .join("models")
        })
    }
}
