//! Writing `words.json`, `segments.json` and `transcript.vtt`, and the
//! summary line for the calling process.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::types::{Segment, Summary, Word};

/// Subdirectory of the output dir that receives the artifacts.
pub const OUTPUT_SUBDIR: &str = "whisperx";
pub const WORDS_FILE: &str = "words.json";
pub const SEGMENTS_FILE: &str = "segments.json";
pub const VTT_FILE: &str = "transcript.vtt";

/// Prefix of the single machine-readable stdout line.
pub const RESULT_SENTINEL: &str = "__WHISPERX_RESULT__:";

/// Round to 3 decimal places.
pub fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

fn rounded_word(w: &Word) -> Word {
    Word {
        word: w.word.clone(),
        start: round3(w.start),
        end: round3(w.end),
        score: round3(w.score),
    }
}

/// Segments with every time and score rounded, as they are written to disk.
pub fn rounded_segments(segments: &[Segment]) -> Vec<Segment> {
    segments
        .iter()
        .map(|seg| Segment {
            text: seg.text.clone(),
            start: round3(seg.start),
            end: round3(seg.end),
            words: seg.words.iter().map(rounded_word).collect(),
        })
        .collect()
}

/// All words across all segments, in order of occurrence, rounded.
pub fn flatten_words(segments: &[Segment]) -> Vec<Word> {
    segments
        .iter()
        .flat_map(|seg| seg.words.iter().map(rounded_word))
        .collect()
}

/// Format seconds as VTT timestamp: HH:MM:SS.mmm
///
/// Milliseconds are rounded from the fractional second alone, so the whole
/// part never picks up float error; a rounded 1000 ms carries into seconds.
/// Hours widen past two digits instead of wrapping.
pub fn format_vtt_time(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let whole = seconds.floor();
    let mut total_secs = whole as u64;
    let mut ms = ((seconds - whole) * 1000.0).round() as u64;
    if ms >= 1000 {
        total_secs += 1;
        ms -= 1000;
    }
    let h = total_secs / 3600;
    let m = (total_secs % 3600) / 60;
    let s = total_secs % 60;
    format!("{h:02}:{m:02}:{s:02}.{ms:03}")
}

/// Format segments as WebVTT with 1-based cue indices.
pub fn to_vtt(segments: &[Segment]) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for (i, seg) in segments.iter().enumerate() {
        let _ = write!(
            out,
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_vtt_time(seg.start),
            format_vtt_time(seg.end),
            seg.text.trim()
        );
    }
    out
}

/// End of the last word, or 0 when no word was aligned.
pub fn duration_from_words(words: &[Word]) -> f64 {
    words.last().map(|w| round3(w.end)).unwrap_or(0.0)
}

/// Write all three artifacts under `<output_dir>/whisperx/` and describe them.
///
/// Files are written in order words, segments, vtt. A failure part way leaves
/// the earlier files in place.
pub fn write_outputs(segments: &[Segment], language: &str, output_dir: &Path) -> Result<Summary> {
    let out_dir = output_dir.join(OUTPUT_SUBDIR);
    fs::create_dir_all(&out_dir)?;

    let words = flatten_words(segments);
    let segments = rounded_segments(segments);

    let words_path = out_dir.join(WORDS_FILE);
    fs::write(&words_path, serde_json::to_string_pretty(&words)?)?;
    info!("words: {} -> {}", words.len(), words_path.display());

    let segments_path = out_dir.join(SEGMENTS_FILE);
    fs::write(&segments_path, serde_json::to_string_pretty(&segments)?)?;
    info!("segments: {} -> {}", segments.len(), segments_path.display());

    let vtt_path = out_dir.join(VTT_FILE);
    fs::write(&vtt_path, to_vtt(&segments))?;
    info!("vtt: {}", vtt_path.display());

    Ok(Summary {
        status: "ok".to_string(),
        language: language.to_string(),
        word_count: words.len(),
        segment_count: segments.len(),
        duration_s: duration_from_words(&words),
        words_path: words_path.display().to_string(),
        segments_path: segments_path.display().to_string(),
        vtt_path: vtt_path.display().to_string(),
    })
}

impl Summary {
    /// `__WHISPERX_RESULT__:<json>`, ready to print as one stdout line.
    pub fn result_line(&self) -> Result<String> {
        Ok(format!("{RESULT_SENTINEL}{}", serde_json::to_string(self)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn word(text: &str, start: f64, end: f64, score: f64) -> Word {
        Word {
            word: text.to_string(),
            start,
            end,
            score,
        }
    }

    fn aligned_segments() -> Vec<Segment> {
        vec![
            Segment {
                text: " Hello world.".into(),
                start: 0.0,
                end: 1.2346,
                words: vec![
                    word("Hello", 0.1, 0.5004, 0.91234),
                    word("world.", 0.6, 1.2346, 0.8),
                ],
            },
            Segment {
                text: " Bye.".into(),
                start: 1.5,
                end: 2.0,
                words: vec![word("Bye.", 1.55, 1.9996, 0.7)],
            },
        ]
    }

    #[test]
    fn test_format_vtt_time() {
        assert_eq!(format_vtt_time(0.0), "00:00:00.000");
        assert_eq!(format_vtt_time(1.5), "00:00:01.500");
        assert_eq!(format_vtt_time(61.25), "00:01:01.250");
        assert_eq!(format_vtt_time(3661.2005), "01:01:01.200");
    }

    #[test]
    fn test_format_vtt_time_carries_rounded_second() {
        assert_eq!(format_vtt_time(59.9996), "00:01:00.000");
        assert_eq!(format_vtt_time(3599.9999), "01:00:00.000");
    }

    #[test]
    fn test_format_vtt_time_wide_hours() {
        assert_eq!(format_vtt_time(360_000.0), "100:00:00.000");
    }

    #[test]
    fn test_format_vtt_time_clamps_invalid() {
        assert_eq!(format_vtt_time(-3.0), "00:00:00.000");
        assert_eq!(format_vtt_time(f64::NAN), "00:00:00.000");
    }

    #[test]
    fn test_round3() {
        assert_eq!(round3(1.23449), 1.234);
        assert_eq!(round3(0.91234), 0.912);
        assert_eq!(round3(2.0), 2.0);
    }

    #[test]
    fn test_vtt_two_segments() {
        let segments = vec![Segment::new("Hi", 0.0, 1.0), Segment::new("there", 1.0, 2.0)];
        assert_eq!(
            to_vtt(&segments),
            "WEBVTT\n\n\
             1\n00:00:00.000 --> 00:00:01.000\nHi\n\n\
             2\n00:00:01.000 --> 00:00:02.000\nthere\n\n"
        );
    }

    #[test]
    fn test_vtt_trims_text() {
        let vtt = to_vtt(&[Segment::new("  padded text \n", 0.0, 1.0)]);
        assert!(vtt.contains("\npadded text\n\n"));
    }

    #[test]
    fn test_vtt_empty() {
        assert_eq!(to_vtt(&[]), "WEBVTT\n\n");
    }

    #[test]
    fn test_flatten_words_order_and_rounding() {
        let words = flatten_words(&aligned_segments());
        let texts: Vec<&str> = words.iter().map(|w| w.word.as_str()).collect();
        assert_eq!(texts, ["Hello", "world.", "Bye."]);
        assert_eq!(words[0].end, 0.5);
        assert_eq!(words[0].score, 0.912);
        assert_eq!(words[2].end, 2.0);
    }

    #[test]
    fn test_duration_from_words() {
        assert_eq!(duration_from_words(&[]), 0.0);
        let words = flatten_words(&aligned_segments());
        assert_eq!(duration_from_words(&words), 2.0);
    }

    #[test]
    fn test_write_outputs_files_and_summary() {
        let tmp = TempDir::new().unwrap();
        let summary = write_outputs(&aligned_segments(), "en", tmp.path()).unwrap();

        let dir = tmp.path().join(OUTPUT_SUBDIR);
        for name in [WORDS_FILE, SEGMENTS_FILE, VTT_FILE] {
            let meta = fs::metadata(dir.join(name)).unwrap();
            assert!(meta.len() > 0, "{name} is empty");
        }

        assert_eq!(summary.status, "ok");
        assert_eq!(summary.language, "en");
        assert_eq!(summary.word_count, 3);
        assert_eq!(summary.segment_count, 2);
        assert_eq!(summary.duration_s, 2.0);
        assert_eq!(summary.words_path, dir.join(WORDS_FILE).display().to_string());
        assert_eq!(summary.vtt_path, dir.join(VTT_FILE).display().to_string());
    }

    #[test]
    fn test_segments_json_words_match_words_json() {
        let tmp = TempDir::new().unwrap();
        write_outputs(&aligned_segments(), "en", tmp.path()).unwrap();
        let dir = tmp.path().join(OUTPUT_SUBDIR);

        let flat: Vec<Word> =
            serde_json::from_str(&fs::read_to_string(dir.join(WORDS_FILE)).unwrap()).unwrap();
        let segments: Vec<Segment> =
            serde_json::from_str(&fs::read_to_string(dir.join(SEGMENTS_FILE)).unwrap()).unwrap();

        let nested: Vec<Word> = segments.into_iter().flat_map(|s| s.words).collect();
        assert_eq!(nested, flat);
    }

    #[test]
    fn test_segments_json_keeps_untrimmed_text() {
        let tmp = TempDir::new().unwrap();
        write_outputs(&aligned_segments(), "en", tmp.path()).unwrap();
        let raw = fs::read_to_string(tmp.path().join(OUTPUT_SUBDIR).join(SEGMENTS_FILE)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value[0]["text"], " Hello world.");
        assert_eq!(value[0]["end"], 1.235);
        assert_eq!(value[0]["words"][0]["word"], "Hello");
    }

    #[test]
    fn test_write_outputs_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join(OUTPUT_SUBDIR);

        write_outputs(&aligned_segments(), "en", tmp.path()).unwrap();
        let first: Vec<Vec<u8>> = [WORDS_FILE, SEGMENTS_FILE, VTT_FILE]
            .iter()
            .map(|n| fs::read(dir.join(n)).unwrap())
            .collect();

        write_outputs(&aligned_segments(), "en", tmp.path()).unwrap();
        let second: Vec<Vec<u8>> = [WORDS_FILE, SEGMENTS_FILE, VTT_FILE]
            .iter()
            .map(|n| fs::read(dir.join(n)).unwrap())
            .collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_write_outputs_without_words() {
        let tmp = TempDir::new().unwrap();
        let segments = vec![Segment::new("Hi", 0.0, 1.0), Segment::new("there", 1.0, 2.0)];
        let summary = write_outputs(&segments, "en", tmp.path()).unwrap();

        let dir = tmp.path().join(OUTPUT_SUBDIR);
        assert_eq!(fs::read_to_string(dir.join(WORDS_FILE)).unwrap(), "[]");
        assert_eq!(summary.word_count, 0);
        assert_eq!(summary.duration_s, 0.0);
        assert_eq!(summary.segment_count, 2);
    }

    #[test]
    fn test_result_line() {
        let summary = Summary {
            status: "ok".into(),
            language: "de".into(),
            word_count: 0,
            segment_count: 0,
            duration_s: 0.0,
            words_path: "out/whisperx/words.json".into(),
            segments_path: "out/whisperx/segments.json".into(),
            vtt_path: "out/whisperx/transcript.vtt".into(),
        };
        let line = summary.result_line().unwrap();
        let json = line.strip_prefix(RESULT_SENTINEL).unwrap();
        let parsed: Summary = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, summary);
        assert!(!line.contains('\n'));
    }
}
