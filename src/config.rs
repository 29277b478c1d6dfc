//! Configuration for the transfer runner

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "es2loki-labels",
    version,
    about = "Annotate Elasticsearch log documents with Loki labels"
)]
pub struct Config {
    /// NDJSON file of source documents, stdin when omitted
    #[arg(long, env = "TRANSFER_INPUT")]
    pub input: Option<PathBuf>,

    /// File receiving labeled records, stdout when omitted
    #[arg(long, env = "TRANSFER_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Key holding the document inside an Elasticsearch hit
    #[arg(long, env = "TRANSFER_SOURCE_FIELD", default_value = "_source")]
    pub source_field: String,

    /// Drop documents that produce no labels instead of forwarding them
    #[arg(long, env = "TRANSFER_SKIP_UNLABELED")]
    pub skip_unlabeled: bool,

    /// Abort once more than this many lines fail to decode
    #[arg(long, env = "TRANSFER_MAX_BAD_LINES")]
    pub max_bad_lines: Option<u64>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "TRANSFER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: None,
            output: None,
            source_field: "_source".to_string(),
            skip_unlabeled: false,
            max_bad_lines: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.source_field.is_empty() {
            return Err("source_field cannot be empty".to_string());
        }

        if self.log_level.trim().is_empty() {
            return Err("log_level cannot be empty".to_string());
        }

        if let (Some(input), Some(output)) = (&self.input, &self.output)
            && input == output
        {
            return Err(format!(
                "input and output must differ, both are {}",
                input.display()
            ));
        }

        Ok(())
    }

    /// Human readable input location, for logs
    pub fn input_name(&self) -> String {
        self.input
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "stdin".to_string())
    }

    /// Human readable output location, for logs
    pub fn output_name(&self) -> String {
        self.output
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "stdout".to_string())
    }
}
