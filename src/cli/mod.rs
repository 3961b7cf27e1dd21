use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "analyzer",
    about = "Recording Analyzer - transcribe and analyze stored recordings with TwelveLabs",
    version,
    long_about = "Uploads a recording from storage to TwelveLabs, waits for it to be indexed, and prints its timestamped transcript together with an evidence-based analysis. WebM recordings are transcoded to MP4 with ffmpeg before upload."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./config.yaml, then the user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a recording stored under OBJECT_KEY
    Analyze {
        /// Storage key of the recording, relative to the storage root
        #[arg(value_name = "OBJECT_KEY")]
        object_key: String,

        /// Filename to upload as (defaults to the last segment of the key)
        #[arg(long, value_name = "NAME")]
        filename: Option<String>,

        /// Analysis prompt
        #[arg(short, long, value_name = "TEXT", conflicts_with = "prompt_file")]
        prompt: Option<String>,

        /// Read the analysis prompt from a file
        #[arg(long, value_name = "FILE")]
        prompt_file: Option<PathBuf>,

        /// Directory object keys are resolved against (overrides storage.root)
        #[arg(long, value_name = "DIR")]
        storage_root: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Show configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// Check that external tools are available
    Check,
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text report
    Text,
    /// JSON with all diagnostic fields
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
