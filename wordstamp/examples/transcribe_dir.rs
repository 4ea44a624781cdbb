//! Transcribe a WAV file and print the result line.
//!
//! Usage: cargo run --example transcribe_dir -- path/to/call.wav out/

use wordstamp::{Model, TranscribeOptions};

fn main() -> wordstamp::Result<()> {
    let mut args = std::env::args().skip(1);
    let input = args.next().expect("usage: transcribe_dir <audio-file> <output-dir>");
    let output_dir = args.next().expect("usage: transcribe_dir <audio-file> <output-dir>");

    let opts = TranscribeOptions::new().model(Model::Tiny);
    let summary = wordstamp::transcribe_to_dir(&input, &output_dir, &opts)?;

    println!(
        "{} words in {} segments ({:.1}s)",
        summary.word_count, summary.segment_count, summary.duration_s
    );
    println!("{}", summary.result_line()?);

    Ok(())
}
