//! Output format module implementation

mod csv;
mod json;

pub use self::csv::*;
pub use self::json::*;

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;

use crate::{DisasmSection, DisassemblyError};

/// Supported output formats for recovered basic blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output (default)
    Text,
    /// JSON format (hierarchical)
    Json,
    /// JSON Lines format (one block per line)
    JsonLines,
    /// CSV format (one instruction per row)
    Csv,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::JsonLines => write!(f, "jsonl"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "jsonl" | "jsonlines" => Ok(OutputFormat::JsonLines),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl OutputFormat {
    /// Get all available output formats
    pub fn available_formats() -> &'static [Self] {
        &[
            OutputFormat::Text,
            OutputFormat::Json,
            OutputFormat::JsonLines,
            OutputFormat::Csv,
        ]
    }

    /// Get a formatter for this output format
    pub fn get_formatter(&self) -> Box<dyn SectionFormatter> {
        match self {
            OutputFormat::Text => Box::new(TextFormatter),
            OutputFormat::Json => Box::new(JsonFormatter),
            OutputFormat::JsonLines => Box::new(JsonLinesFormatter),
            OutputFormat::Csv => Box::new(CsvFormatter),
        }
    }
}

/// Formatter trait over the engine's per-section output
pub trait SectionFormatter {
    /// Render every section's committed blocks
    fn format(&self, sections: &[DisasmSection<'_>]) -> Result<String, DisassemblyError>;
}

/// Format recovered blocks as plain text
pub struct TextFormatter;

/// Format recovered blocks as JSON
pub struct JsonFormatter;

/// Format recovered blocks as JSON Lines
pub struct JsonLinesFormatter;

/// Format recovered blocks as CSV
pub struct CsvFormatter;

impl SectionFormatter for TextFormatter {
    fn format(&self, sections: &[DisasmSection<'_>]) -> Result<String, DisassemblyError> {
        let mut out: Vec<u8> = Vec::new();
        for dis in sections {
            dis.write_blocks(&mut out)?;
        }
        String::from_utf8(out).map_err(|e| DisassemblyError::Format(e.to_string()))
    }
}
