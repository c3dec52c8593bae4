//! The `pedattr score` command.

use clap::Args;
use pedattr_core::{AttributeRecognizer, Config, FileDiscovery, ScoredImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use super::output::{write_many, write_one, OutputFormat};

/// Arguments for the `score` command.
#[derive(Args, Debug)]
pub struct ScoreArgs {
    /// Image file, image id inside the upload directory, or directory
    #[arg(required = true)]
    pub input: PathBuf,

    /// Write `<stem>_predicted.png` next to every scored image
    #[arg(short, long)]
    pub annotate: bool,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,
}

/// Execute the score command.
pub fn execute(args: ScoreArgs, config: Config) -> anyhow::Result<()> {
    let recognizer = AttributeRecognizer::new(config)?;

    let resolved = recognizer.resolve_image(&args.input);
    if resolved.is_dir() {
        score_directory(&recognizer, &args, resolved)
    } else {
        let record = score_single(&recognizer, &args)?;
        let mut writer = open_output(&args)?;
        write_one(&mut writer, &record, args.format)?;
        writer.flush()?;
        if let Some(path) = &args.output {
            tracing::info!("Output written to {:?}", path);
        }
        Ok(())
    }
}

/// Score one image or upload id. `process` does the upload-dir lookup itself.
fn score_single(
    recognizer: &AttributeRecognizer,
    args: &ScoreArgs,
) -> anyhow::Result<ScoredImage> {
    Ok(recognizer.process(&args.input, args.annotate)?)
}

fn score_directory(
    recognizer: &AttributeRecognizer,
    args: &ScoreArgs,
    dir: PathBuf,
) -> anyhow::Result<()> {
    let discovery = FileDiscovery::new(recognizer.config().annotation.suffix.clone());
    let files = discovery.discover(&dir);
    if files.is_empty() {
        tracing::warn!("No supported image files found at {:?}", dir);
        return Ok(());
    }
    tracing::info!("Found {} image(s) to score", files.len());

    let start = Instant::now();
    let pb = create_progress_bar(files.len() as u64);
    let mut records: Vec<ScoredImage> = Vec::with_capacity(files.len());
    let mut failed = 0u64;

    for path in &files {
        pb.set_message(
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        match recognizer.process(path, args.annotate) {
            Ok(record) => records.push(record),
            Err(e) => {
                failed += 1;
                pb.suspend(|| tracing::warn!("Failed to score {:?}: {e}", path));
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    let mut writer = open_output(args)?;
    write_many(&mut writer, &records, args.format)?;
    writer.flush()?;

    print_summary(records.len() as u64, failed, start.elapsed());
    Ok(())
}

fn open_output(args: &ScoreArgs) -> anyhow::Result<Box<dyn Write>> {
    Ok(match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout().lock()),
    })
}

fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
    ) {
        pb.set_style(style.progress_chars("##-"));
    }
    pb.set_message("starting...");
    pb
}

/// Print a formatted summary table after directory scoring.
fn print_summary(succeeded: u64, failed: u64, elapsed: std::time::Duration) {
    let total = succeeded + failed;
    let rate = if elapsed.as_secs_f64() > 0.0 {
        total as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Scored:       {:>8}", succeeded);
    if failed > 0 {
        eprintln!("    Failed:       {:>8}", failed);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", total);
    eprintln!("    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("    Rate:         {:>7.1} img/sec", rate);
    eprintln!("  ====================================");
}
