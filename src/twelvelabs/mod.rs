//! Remote video-intelligence service vocabulary.
//!
//! The workflow only talks to the service through [`VideoIntelligence`], so it
//! can be driven by the bundled HTTP client or by a test double.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

pub mod client;

pub use client::TwelveLabsClient;

use crate::storage::ByteStream;
use crate::Result;

/// Status of a remote asset or indexing job.
///
/// Values the service may add later end up in [`JobStatus::Other`] and are
/// treated as still in transit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Ready,
    Failed,
    Waiting,
    Pending,
    Queued,
    Processing,
    Validating,
    Indexing,
    Other(String),
    Missing,
}

impl JobStatus {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => JobStatus::Missing,
            Some("ready") => JobStatus::Ready,
            Some("failed") => JobStatus::Failed,
            Some("waiting") => JobStatus::Waiting,
            Some("pending") => JobStatus::Pending,
            Some("queued") => JobStatus::Queued,
            Some("processing") => JobStatus::Processing,
            Some("validating") => JobStatus::Validating,
            Some("indexing") => JobStatus::Indexing,
            Some(other) => JobStatus::Other(other.to_string()),
        }
    }

    /// True for statuses the service is not known to emit
    pub fn is_unrecognized(&self) -> bool {
        matches!(self, JobStatus::Other(_) | JobStatus::Missing)
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Ready => "ready",
            JobStatus::Failed => "failed",
            JobStatus::Waiting => "waiting",
            JobStatus::Pending => "pending",
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Validating => "validating",
            JobStatus::Indexing => "indexing",
            JobStatus::Other(other) => other,
            JobStatus::Missing => "none",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Id returned by create calls; absent ids are reported by the caller
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatedResource {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: Option<String>,
}

impl CreatedResource {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self { id: Some(id.into()) }
    }

    /// The id if it is present and not blank
    pub fn non_empty_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Asset {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl Asset {
    pub fn status(&self) -> JobStatus {
        JobStatus::parse(self.status.as_deref())
    }
}

/// Technical metadata the service captures for an indexed video
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemMetadata {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub duration: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fps: Option<f64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub width: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub height: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub size: Option<u64>,
}

impl SystemMetadata {
    /// True when at least one field usable as a search filter is present
    pub fn has_filters(&self) -> bool {
        self.duration.is_some()
            || self.fps.is_some()
            || self.width.is_some()
            || self.height.is_some()
            || self.size.is_some()
    }
}

/// One timestamped piece of the transcription payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub start: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub end: Option<f64>,
}

impl TranscriptSegment {
    pub fn new(value: impl Into<String>, start: Option<f64>, end: Option<f64>) -> Self {
        Self {
            value: Some(value.into()),
            start,
            end,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexedAsset {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub system_metadata: Option<SystemMetadata>,
    #[serde(default)]
    pub transcription: Option<Vec<TranscriptSegment>>,
}

impl IndexedAsset {
    pub fn status(&self) -> JobStatus {
        JobStatus::parse(self.status.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoSummary {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: Option<String>,
}

impl VideoSummary {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self { id: Some(id.into()) }
    }
}

/// Metadata filters for the video listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    pub duration: Option<f64>,
    pub fps: Option<f64>,
    pub width: Option<u64>,
    pub height: Option<u64>,
    pub size: Option<u64>,
}

impl From<&SystemMetadata> for MetadataFilter {
    fn from(metadata: &SystemMetadata) -> Self {
        Self {
            duration: metadata.duration,
            fps: metadata.fps,
            width: metadata.width,
            height: metadata.height,
            size: metadata.size,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VideoFilter {
    None,
    Filename(String),
    Metadata(MetadataFilter),
}

/// Listing request, always sorted by creation time
#[derive(Debug, Clone, PartialEq)]
pub struct VideoQuery {
    pub page: u32,
    pub page_limit: u32,
    pub sort_by: &'static str,
    pub sort_option: &'static str,
    pub filter: VideoFilter,
}

impl VideoQuery {
    /// Newest first, first page
    pub fn newest(page_limit: u32, filter: VideoFilter) -> Self {
        Self {
            page: 1,
            page_limit,
            sort_by: "created_at",
            sort_option: "desc",
            filter,
        }
    }

    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("page_limit", self.page_limit.to_string()),
            ("sort_by", self.sort_by.to_string()),
            ("sort_option", self.sort_option.to_string()),
        ];

        match &self.filter {
            VideoFilter::None => {}
            VideoFilter::Filename(filename) => pairs.push(("filename", filename.clone())),
            VideoFilter::Metadata(filter) => {
                let fields = [
                    ("duration", filter.duration.map(|v| v.to_string())),
                    ("fps", filter.fps.map(|v| v.to_string())),
                    ("width", filter.width.map(|v| v.to_string())),
                    ("height", filter.height.map(|v| v.to_string())),
                    ("size", filter.size.map(|v| v.to_string())),
                ];
                pairs.extend(fields.into_iter().filter_map(|(k, v)| v.map(|v| (k, v))));
            }
        }

        pairs
    }
}

/// Body of a direct asset upload
pub struct AssetUpload {
    pub filename: String,
    pub mime_type: String,
    pub size: Option<u64>,
    pub stream: ByteStream,
}

impl std::fmt::Debug for AssetUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetUpload")
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Operations the analysis workflow needs from the remote service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoIntelligence: Send + Sync {
    /// Upload a file as a new asset ("direct" method)
    async fn create_asset(&self, upload: AssetUpload) -> Result<CreatedResource>;

    async fn retrieve_asset(&self, asset_id: &str) -> Result<Asset>;

    /// Submit an asset to an index
    async fn create_indexed_asset(&self, index_id: &str, asset_id: &str) -> Result<CreatedResource>;

    async fn retrieve_indexed_asset(
        &self,
        index_id: &str,
        indexed_asset_id: &str,
        transcription: bool,
    ) -> Result<IndexedAsset>;

    async fn list_videos(&self, index_id: &str, query: &VideoQuery) -> Result<Vec<VideoSummary>>;

    /// Run an open-ended analysis prompt against an indexed video
    async fn analyze(&self, video_id: &str, prompt: &str) -> Result<String>;
}

fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_f64()))
}

fn lenient_u64<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| {
        v.as_u64()
            .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
    }))
}
