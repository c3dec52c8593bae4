//! JSON / JSON Lines output for scored images.

use clap::ValueEnum;
use serde::Serialize;
use std::io::{self, Write};

/// Supported output formats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON object or array
    #[default]
    Json,
    /// One JSON object per line (newline-delimited)
    Jsonl,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Jsonl => write!(f, "jsonl"),
        }
    }
}

/// Per-image failure reported in place of a result.
#[derive(Debug, Serialize)]
pub struct Failure {
    pub image: String,
    pub error: String,
}

/// Write one record. JSON is pretty-printed; JSONL is always one line.
pub fn write_one<W: Write, T: Serialize>(
    writer: &mut W,
    item: &T,
    format: OutputFormat,
) -> io::Result<()> {
    let result = match format {
        OutputFormat::Json => serde_json::to_writer_pretty(&mut *writer, item),
        OutputFormat::Jsonl => serde_json::to_writer(&mut *writer, item),
    };
    result.map_err(io::Error::other)?;
    writeln!(writer)
}

/// Write many records: a JSON array, or one line per record.
pub fn write_many<W: Write, T: Serialize>(
    writer: &mut W,
    items: &[T],
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Json => write_one(writer, &items, format),
        OutputFormat::Jsonl => {
            for item in items {
                write_one(writer, item, format)?;
            }
            Ok(())
        }
    }
}
