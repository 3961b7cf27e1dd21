use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio_util::io::ReaderStream;

use super::{
    Asset, AssetUpload, CreatedResource, IndexedAsset, VideoIntelligence, VideoQuery,
    VideoSummary,
};
use crate::config::{Credentials, TwelveLabsConfig};
use crate::{AnalyzerError, Result};

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    data: Vec<VideoSummary>,
}

/// HTTP client for the TwelveLabs REST API
#[derive(Clone)]
pub struct TwelveLabsClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for TwelveLabsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwelveLabsClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl TwelveLabsClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("recording-analyzer/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &TwelveLabsConfig, credentials: &Credentials) -> Result<Self> {
        Self::new(
            credentials.api_key.clone(),
            config.base_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Turn non-2xx responses into [`AnalyzerError::Remote`]
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(AnalyzerError::Remote {
            status: status.as_u16(),
            body,
        })
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let response = Self::check(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl VideoIntelligence for TwelveLabsClient {
    async fn create_asset(&self, upload: AssetUpload) -> Result<CreatedResource> {
        tracing::debug!(
            "Uploading {} ({}) as a direct asset",
            upload.filename,
            upload.mime_type
        );

        let body = reqwest::Body::wrap_stream(ReaderStream::new(upload.stream));
        let part = match upload.size {
            Some(length) => Part::stream_with_length(body, length),
            None => Part::stream(body),
        }
        .file_name(upload.filename.clone())
        .mime_str(&upload.mime_type)?;

        let form = Form::new()
            .text("method", "direct")
            .text("filename", upload.filename)
            .part("file", part);

        let response = self
            .http
            .post(self.url("assets"))
            .header("x-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await?;

        Self::read_json(response).await
    }

    async fn retrieve_asset(&self, asset_id: &str) -> Result<Asset> {
        let response = self
            .http
            .get(self.url(&format!("assets/{}", asset_id)))
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        Self::read_json(response).await
    }

    async fn create_indexed_asset(&self, index_id: &str, asset_id: &str) -> Result<CreatedResource> {
        let response = self
            .http
            .post(self.url(&format!("indexes/{}/indexed-assets", index_id)))
            .header("x-api-key", &self.api_key)
            .json(&json!({ "asset_id": asset_id }))
            .send()
            .await?;

        Self::read_json(response).await
    }

    async fn retrieve_indexed_asset(
        &self,
        index_id: &str,
        indexed_asset_id: &str,
        transcription: bool,
    ) -> Result<IndexedAsset> {
        let mut request = self
            .http
            .get(self.url(&format!("indexes/{}/indexed-assets/{}", index_id, indexed_asset_id)))
            .header("x-api-key", &self.api_key);

        if transcription {
            request = request.query(&[("transcription", "true")]);
        }

        Self::read_json(request.send().await?).await
    }

    async fn list_videos(&self, index_id: &str, query: &VideoQuery) -> Result<Vec<VideoSummary>> {
        let response = self
            .http
            .get(self.url(&format!("indexes/{}/videos", index_id)))
            .header("x-api-key", &self.api_key)
            .query(&query.to_query_pairs())
            .send()
            .await?;

        let listing: VideoListResponse = Self::read_json(response).await?;
        Ok(listing.data)
    }

    async fn analyze(&self, video_id: &str, prompt: &str) -> Result<String> {
        let response = self
            .http
            .post(self.url("analyze"))
            .header("x-api-key", &self.api_key)
            .json(&json!({
                "video_id": video_id,
                "prompt": prompt,
                "stream": false,
            }))
            .send()
            .await?;

        let response = Self::check(response).await?;
        let body = response.text().await?;

        // Fall back to the raw body when the service omits `data`
        let text = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|value| value.get("data").and_then(|d| d.as_str()).map(str::to_string))
            .unwrap_or(body);

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::twelvelabs::{JobStatus, VideoFilter};
    use mockito::Matcher;

    fn client(server: &mockito::Server) -> TwelveLabsClient {
        TwelveLabsClient::new("test-key", server.url(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_create_asset_sends_multipart_upload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/assets")
            .match_header("x-api-key", "test-key")
            .match_header("content-type", Matcher::Regex("multipart/form-data".to_string()))
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="method"\s+direct"#.to_string()),
                Matcher::Regex(r#"name="filename"\s+rec\.mp4"#.to_string()),
                Matcher::Regex(r#"filename="rec\.mp4""#.to_string()),
                Matcher::Regex("video/mp4".to_string()),
                Matcher::Regex("mp4-bytes".to_string()),
            ]))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"_id": "asset-1", "status": "processing"}"#)
            .create_async()
            .await;

        let upload = AssetUpload {
            filename: "rec.mp4".to_string(),
            mime_type: "video/mp4".to_string(),
            size: Some(9),
            stream: Box::new(&b"mp4-bytes"[..]),
        };
        let created = client(&server).create_asset(upload).await.unwrap();

        mock.assert_async().await;
        assert_eq!(created.non_empty_id(), Some("asset-1"));
    }

    #[tokio::test]
    async fn test_retrieve_asset_reads_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/assets/asset-1")
            .match_header("x-api-key", "test-key")
            .with_status(200)
            .with_body(r#"{"_id": "asset-1", "status": "ready"}"#)
            .create_async()
            .await;

        let asset = client(&server).retrieve_asset("asset-1").await.unwrap();

        mock.assert_async().await;
        assert_eq!(asset.status(), JobStatus::Ready);
    }

    #[tokio::test]
    async fn test_create_indexed_asset_posts_asset_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/indexes/idx-1/indexed-assets")
            .match_body(Matcher::Json(serde_json::json!({"asset_id": "asset-1"})))
            .with_status(202)
            .with_body(r#"{"_id": "ia-1"}"#)
            .create_async()
            .await;

        let created = client(&server)
            .create_indexed_asset("idx-1", "asset-1")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(created.non_empty_id(), Some("ia-1"));
    }

    #[tokio::test]
    async fn test_retrieve_indexed_asset_requests_transcription() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/indexes/idx-1/indexed-assets/ia-1")
            .match_query(Matcher::UrlEncoded("transcription".into(), "true".into()))
            .with_status(200)
            .with_body(r#"{"_id": "ia-1", "status": "ready", "transcription": [{"value": "hi", "start": 1.0, "end": 2.5}]}"#)
            .create_async()
            .await;

        let details = client(&server)
            .retrieve_indexed_asset("idx-1", "ia-1", true)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(details.transcription.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_videos_sends_filters() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/indexes/idx-1/videos")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("page".into(), "1".into()),
                Matcher::UrlEncoded("page_limit".into(), "5".into()),
                Matcher::UrlEncoded("sort_by".into(), "created_at".into()),
                Matcher::UrlEncoded("sort_option".into(), "desc".into()),
                Matcher::UrlEncoded("filename".into(), "my rec.webm".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"data": [{"_id": "vid-1"}, {"_id": "vid-2"}], "page_info": {"page": 1}}"#)
            .create_async()
            .await;

        let query = VideoQuery::newest(5, VideoFilter::Filename("my rec.webm".to_string()));
        let videos = client(&server).list_videos("idx-1", &query).await.unwrap();

        mock.assert_async().await;
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].id.as_deref(), Some("vid-1"));
    }

    #[tokio::test]
    async fn test_analyze_returns_data_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/analyze")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "video_id": "vid-1",
                "prompt": "Summarize",
                "stream": false
            })))
            .with_status(200)
            .with_body(r#"{"id": "gen-1", "data": "Clear answers with concrete metrics."}"#)
            .create_async()
            .await;

        let text = client(&server).analyze("vid-1", "Summarize").await.unwrap();

        mock.assert_async().await;
        assert_eq!(text, "Clear answers with concrete metrics.");
    }

    #[tokio::test]
    async fn test_error_status_becomes_remote_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/assets/missing")
            .with_status(404)
            .with_body(r#"{"code": "resource_not_exists"}"#)
            .create_async()
            .await;

        let err = client(&server).retrieve_asset("missing").await.unwrap_err();

        match err {
            AnalyzerError::Remote { status, body } => {
                assert_eq!(status, 404);
                assert!(body.contains("resource_not_exists"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
