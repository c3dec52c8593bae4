//! The `pedattr stream` command: one request per stdin line.
//!
//! The model is loaded once; every line names an image (path or upload id)
//! and gets exactly one JSON line back. A failure for one image is reported
//! as `{"image": ..., "error": ...}` and does not stop the stream.

use clap::Args;
use pedattr_core::{AttributeRecognizer, Config};
use std::io::{BufRead, Write};

use super::output::{write_one, Failure, OutputFormat};

/// Arguments for the `stream` command.
#[derive(Args, Debug)]
pub struct StreamArgs {
    /// Write `<stem>_predicted.png` next to every scored image
    #[arg(short, long)]
    pub annotate: bool,
}

/// Execute the stream command.
pub fn execute(args: StreamArgs, config: Config) -> anyhow::Result<()> {
    let recognizer = AttributeRecognizer::new(config)?;
    tracing::info!("Ready, reading image ids from stdin");

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let served = serve(&recognizer, args.annotate, stdin.lock(), stdout.lock())?;
    tracing::info!("Input closed after {served} request(s)");
    Ok(())
}

/// Answer every non-empty line of `input`. Returns the number of requests.
fn serve<R: BufRead, W: Write>(
    recognizer: &AttributeRecognizer,
    annotate: bool,
    input: R,
    mut output: W,
) -> anyhow::Result<usize> {
    let mut served = 0;
    for line in input.lines() {
        let line = line?;
        let id = line.trim();
        if id.is_empty() {
            continue;
        }
        served += 1;
        match recognizer.process(id, annotate) {
            Ok(record) => write_one(&mut output, &record, OutputFormat::Jsonl)?,
            Err(e) => {
                tracing::warn!("Failed to score {id}: {e}");
                let failure = Failure {
                    image: id.to_string(),
                    error: e.to_string(),
                };
                write_one(&mut output, &failure, OutputFormat::Jsonl)?;
            }
        }
        output.flush()?;
    }
    Ok(served)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::test_support::fixture_recognizer;
    use std::io::Cursor;

    #[test]
    fn test_failed_request_does_not_stop_stream() {
        let dir = tempfile::tempdir().unwrap();
        let recognizer = fixture_recognizer(dir.path());

        let input = Cursor::new("walker.png\n\n   \nmissing.png\nwalker.png\n");
        let mut output = Vec::new();
        let served = serve(&recognizer, false, input, &mut output).unwrap();
        assert_eq!(served, 3);

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);

        assert!(lines[0].get("error").is_none());
        assert_eq!(lines[0]["file_name"], "walker.png");
        assert_eq!(lines[1]["image"], "missing.png");
        assert!(lines[1]["error"].as_str().unwrap().contains("missing.png"));
        assert_eq!(lines[2]["file_name"], "walker.png");
        assert_eq!(lines[2]["attributes"], lines[0]["attributes"]);
        assert_eq!(lines[2]["positive"], serde_json::json!(["Female"]));
    }
}
