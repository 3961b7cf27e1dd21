//! Recording Analyzer - transcribe and analyze recorded videos with TwelveLabs
//!
//! This library takes a recording out of blob storage, prepares it for upload
//! (WebM recordings are transcoded to MP4), drives the remote asset and indexing
//! jobs to completion, recovers the indexed video id and asks the service for
//! an analysis of the recording.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod media;
pub mod output;
pub mod storage;
pub mod twelvelabs;
pub mod utils;

pub use analysis::{analyze_video_from_storage, AnalysisPipeline, AnalysisResult};
pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use media::{MediaPreparer, PreparedUpload};
pub use storage::{LocalStorage, ObjectStorage};
pub use twelvelabs::{TwelveLabsClient, VideoIntelligence};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, AnalyzerError>;

/// Remote job being waited on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    AssetProcessing,
    Indexing,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::AssetProcessing => write!(f, "Asset processing"),
            JobKind::Indexing => write!(f, "Indexing"),
        }
    }
}

/// Error types specific to the analyzer
#[derive(thiserror::Error, Debug)]
pub enum AnalyzerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Indexing request failed: {0}")]
    Indexing(String),

    #[error("{job} failed (status={status})")]
    JobFailed { job: JobKind, status: String },

    #[error("{job} did not finish after {checks} checks in {waited_secs}s (last status={last_status})")]
    JobTimedOut {
        job: JobKind,
        checks: u32,
        waited_secs: u64,
        last_status: String,
    },

    #[error("{job} polling was cancelled")]
    Cancelled { job: JobKind },

    #[error("Analysis was cancelled")]
    Interrupted,

    #[error("Unable to resolve video_id after indexing")]
    Unresolvable,

    #[error("Transcoding failed: {0}")]
    Tooling(String),

    #[error("TwelveLabs API error: HTTP {status} - {body}")]
    Remote { status: u16, body: String },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
