use serde::{Deserialize, Serialize};

use crate::twelvelabs::{
    IndexedAsset, MetadataFilter, VideoFilter, VideoIntelligence, VideoQuery, VideoSummary,
};
use crate::{AnalyzerError, Result};

const FILENAME_PAGE_LIMIT: u32 = 5;
const METADATA_PAGE_LIMIT: u32 = 5;
const MOST_RECENT_PAGE_LIMIT: u32 = 1;

/// Search strategy that produced the video id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionTier {
    Filename,
    Metadata,
    MostRecent,
}

impl std::fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionTier::Filename => write!(f, "filename"),
            ResolutionTier::Metadata => write!(f, "metadata"),
            ResolutionTier::MostRecent => write!(f, "most recent"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVideo {
    pub video_id: String,
    pub tier: ResolutionTier,
}

/// Recovers the video id that indexing created, which the indexing API does not return.
///
/// Tiers run in a fixed order: exact filename, then the captured system
/// metadata, then simply the newest video in the index.
pub struct VideoIdResolver<'a> {
    client: &'a dyn VideoIntelligence,
    index_id: &'a str,
}

impl<'a> VideoIdResolver<'a> {
    pub fn new(client: &'a dyn VideoIntelligence, index_id: &'a str) -> Self {
        Self { client, index_id }
    }

    pub async fn resolve(&self, filename: &str, details: &IndexedAsset) -> Result<ResolvedVideo> {
        let by_name = VideoQuery::newest(FILENAME_PAGE_LIMIT, VideoFilter::Filename(filename.to_string()));
        if let Some(video_id) = self.first_id(&by_name).await? {
            return Ok(Self::resolved(video_id, ResolutionTier::Filename));
        }

        if let Some(metadata) = details.system_metadata.as_ref().filter(|m| m.has_filters()) {
            let by_metadata = VideoQuery::newest(
                METADATA_PAGE_LIMIT,
                VideoFilter::Metadata(MetadataFilter::from(metadata)),
            );
            if let Some(video_id) = self.first_id(&by_metadata).await? {
                return Ok(Self::resolved(video_id, ResolutionTier::Metadata));
            }
        }

        let newest = VideoQuery::newest(MOST_RECENT_PAGE_LIMIT, VideoFilter::None);
        if let Some(video_id) = self.first_id(&newest).await? {
            return Ok(Self::resolved(video_id, ResolutionTier::MostRecent));
        }

        Err(AnalyzerError::Unresolvable)
    }

    async fn first_id(&self, query: &VideoQuery) -> Result<Option<String>> {
        let videos = self.client.list_videos(self.index_id, query).await?;
        Ok(first_non_empty(&videos, query.page_limit as usize))
    }

    fn resolved(video_id: String, tier: ResolutionTier) -> ResolvedVideo {
        match tier {
            ResolutionTier::Filename => tracing::info!("Resolved video {} by filename", video_id),
            _ => tracing::warn!("Resolved video {} by {} fallback", video_id, tier),
        }
        ResolvedVideo { video_id, tier }
    }
}

fn first_non_empty(videos: &[VideoSummary], limit: usize) -> Option<String> {
    videos
        .iter()
        .take(limit)
        .filter_map(|video| video.id.as_deref())
        .find(|id| !id.trim().is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::twelvelabs::{MockVideoIntelligence, SystemMetadata};

    fn details_with_metadata() -> IndexedAsset {
        IndexedAsset {
            system_metadata: Some(SystemMetadata {
                filename: Some("rec.mp4".to_string()),
                duration: Some(42.0),
                fps: Some(30.0),
                width: Some(1280),
                height: Some(720),
                size: Some(2048),
            }),
            ..IndexedAsset::default()
        }
    }

    fn is_filename(query: &VideoQuery) -> bool {
        matches!(query.filter, VideoFilter::Filename(ref name) if name == "rec.webm") && query.page_limit == 5
    }

    fn is_metadata(query: &VideoQuery) -> bool {
        matches!(query.filter, VideoFilter::Metadata(ref m) if m.width == Some(1280) && m.duration == Some(42.0))
            && query.page_limit == 5
    }

    fn is_most_recent(query: &VideoQuery) -> bool {
        query.filter == VideoFilter::None && query.page_limit == 1
    }

    #[tokio::test]
    async fn test_filename_match_skips_other_tiers() {
        let mut client = MockVideoIntelligence::new();
        client
            .expect_list_videos()
            .withf(|index, query| index == "idx" && is_filename(query))
            .times(1)
            .returning(|_, _| Ok(vec![VideoSummary::with_id("vid-name")]));

        let resolved = VideoIdResolver::new(&client, "idx")
            .resolve("rec.webm", &details_with_metadata())
            .await
            .unwrap();

        assert_eq!(resolved.video_id, "vid-name");
        assert_eq!(resolved.tier, ResolutionTier::Filename);
    }

    #[tokio::test]
    async fn test_metadata_match_skips_most_recent() {
        let mut client = MockVideoIntelligence::new();
        client
            .expect_list_videos()
            .withf(|_, query| is_filename(query))
            .times(1)
            .returning(|_, _| Ok(vec![]));
        client
            .expect_list_videos()
            .withf(|_, query| is_metadata(query))
            .times(1)
            .returning(|_, _| Ok(vec![VideoSummary::default(), VideoSummary::with_id("vid-meta")]));

        let resolved = VideoIdResolver::new(&client, "idx")
            .resolve("rec.webm", &details_with_metadata())
            .await
            .unwrap();

        assert_eq!(resolved.video_id, "vid-meta");
        assert_eq!(resolved.tier, ResolutionTier::Metadata);
    }

    #[tokio::test]
    async fn test_without_metadata_falls_back_to_most_recent() {
        let mut client = MockVideoIntelligence::new();
        client
            .expect_list_videos()
            .withf(|_, query| is_filename(query))
            .times(1)
            .returning(|_, _| Ok(vec![VideoSummary::with_id("  ")]));
        client
            .expect_list_videos()
            .withf(|_, query| is_most_recent(query))
            .times(1)
            .returning(|_, _| Ok(vec![VideoSummary::with_id("vid-latest")]));

        let resolved = VideoIdResolver::new(&client, "idx")
            .resolve("rec.webm", &IndexedAsset::default())
            .await
            .unwrap();

        assert_eq!(resolved.video_id, "vid-latest");
        assert_eq!(resolved.tier, ResolutionTier::MostRecent);
    }

    #[tokio::test]
    async fn test_metadata_without_filter_fields_skips_metadata_tier() {
        let details = IndexedAsset {
            system_metadata: Some(SystemMetadata {
                filename: Some("rec.mp4".to_string()),
                ..SystemMetadata::default()
            }),
            ..IndexedAsset::default()
        };

        let mut client = MockVideoIntelligence::new();
        client
            .expect_list_videos()
            .withf(|_, query| is_filename(query))
            .times(1)
            .returning(|_, _| Ok(vec![]));
        client
            .expect_list_videos()
            .withf(|_, query| matches!(query.filter, VideoFilter::Metadata(_)))
            .times(0);
        client
            .expect_list_videos()
            .withf(|_, query| is_most_recent(query))
            .times(1)
            .returning(|_, _| Ok(vec![VideoSummary::with_id("vid-latest")]));

        let resolved = VideoIdResolver::new(&client, "idx")
            .resolve("rec.webm", &details)
            .await
            .unwrap();

        assert_eq!(resolved.tier, ResolutionTier::MostRecent);
        assert_eq!(resolved.video_id, "vid-latest");
    }

    #[tokio::test]
    async fn test_all_tiers_empty_is_unresolvable() {
        let mut client = MockVideoIntelligence::new();
        client
            .expect_list_videos()
            .times(3)
            .returning(|_, _| Ok(vec![]));

        let err = VideoIdResolver::new(&client, "idx")
            .resolve("rec.webm", &details_with_metadata())
            .await
            .unwrap_err();

        assert!(matches!(err, AnalyzerError::Unresolvable));
    }

    #[tokio::test]
    async fn test_listing_error_is_propagated() {
        let mut client = MockVideoIntelligence::new();
        client
            .expect_list_videos()
            .times(1)
            .returning(|_, _| Err(AnalyzerError::Remote { status: 500, body: "oops".to_string() }));

        let err = VideoIdResolver::new(&client, "idx")
            .resolve("rec.webm", &IndexedAsset::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AnalyzerError::Remote { status: 500, .. }));
    }

    #[test]
    fn test_first_non_empty_respects_limit() {
        let videos = vec![VideoSummary::default(), VideoSummary::with_id("late")];

        assert_eq!(first_non_empty(&videos, 1), None);
        assert_eq!(first_non_empty(&videos, 5), Some("late".to_string()));
    }
}
