use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

pub mod poller;
pub mod resolver;

pub use poller::{JobPoller, PollReport};
pub use resolver::{ResolutionTier, ResolvedVideo, VideoIdResolver};

use crate::config::{Config, Credentials};
use crate::media::{self, FfmpegTranscoder, MediaPreparer, PreparedUpload, Transcoder};
use crate::output::format_transcript;
use crate::storage::{LocalStorage, ObjectStorage};
use crate::twelvelabs::{AssetUpload, TwelveLabsClient, VideoIntelligence};
use crate::utils;
use crate::{AnalyzerError, JobKind, Result};

/// Prompt used when neither the caller nor the configuration supplies one
pub const DEFAULT_ANALYSIS_PROMPT: &str = "You are reviewing a recorded mock interview. \
Base every observation on the transcript and its timestamps, and only on what the candidate \
actually says and how the answers are organized.\n\n\
Look at:\n\
- how clear and well structured each answer is\n\
- whether answers give specifics such as metrics, outcomes and scope\n\
- ownership language (decisions the candidate made, work they did)\n\
- mentions of teammates, stakeholders and collaboration\n\
- reflection on tradeoffs and lessons learned\n\
- filler words, vague phrasing and hedging\n\n\
Support each point with a short quote from the transcript and its timestamp when available, \
and keep the feedback constructive and actionable.\n\n\
Do not guess at personality, emotions, confidence or any protected or sensitive attribute, \
and do not draw conclusions that go beyond the words used.\n\n\
Respond with:\n\
1) a short overall summary\n\
2) 3-5 strengths, each with evidence\n\
3) 3-5 suggestions for improvement, each with an example rewrite";

/// Final output of one analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Timestamped transcript text
    pub transcript: String,

    /// Analysis text returned by the service
    pub analysis: String,

    /// Indexed video the analysis ran against
    pub video_id: String,

    /// Which search tier located `video_id`
    pub resolved_by: ResolutionTier,

    pub asset_id: String,

    pub indexed_asset_id: String,

    /// Filename the recording was uploaded under
    pub uploaded_as: String,

    pub completed_at: DateTime<Utc>,
}

/// Storage → upload → asset wait → indexing → transcript → video id → analysis
pub struct AnalysisPipeline {
    config: Config,
    storage: Arc<dyn ObjectStorage>,
    client: Arc<dyn VideoIntelligence>,
    preparer: MediaPreparer,
    poller: JobPoller,
    cancel: CancellationToken,
}

impl AnalysisPipeline {
    /// Create a pipeline around explicit collaborators
    pub fn new(
        config: Config,
        storage: Arc<dyn ObjectStorage>,
        client: Arc<dyn VideoIntelligence>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        let preparer = MediaPreparer::new(transcoder, config.media.temp_dir.clone());
        let cancel = CancellationToken::new();
        let poller = JobPoller::from_config(&config.polling).with_cancellation(cancel.clone());

        Self {
            config,
            storage,
            client,
            preparer,
            poller,
            cancel,
        }
    }

    /// Create a pipeline backed by the TwelveLabs API, local storage and ffmpeg
    pub fn from_config(config: Config) -> Result<Self> {
        let credentials = config.credentials()?;
        let client = TwelveLabsClient::from_config(&config.twelvelabs, &credentials)?;
        let storage = LocalStorage::new(config.storage.root.clone());
        let transcoder = FfmpegTranscoder::new(config.media.ffmpeg_path.clone());

        Ok(Self::new(
            config,
            Arc::new(storage),
            Arc::new(client),
            Arc::new(transcoder),
        ))
    }

    /// Replace the poller; it shares the pipeline's cancellation token
    pub fn with_poller(mut self, poller: JobPoller) -> Self {
        self.poller = poller.with_cancellation(self.cancel.clone());
        self
    }

    /// Cancelling the token aborts the run at whatever step it is in
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.poller = self.poller.with_cancellation(cancel.clone());
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.poller = self.poller.with_progress(show_progress);
        self
    }

    /// Analyze the recording stored under `object_key`
    pub async fn analyze(
        &self,
        object_key: &str,
        filename: Option<&str>,
        prompt: Option<&str>,
    ) -> Result<AnalysisResult> {
        let span = tracing::info_span!("analysis", run_id = %Uuid::new_v4(), object_key = %object_key);
        let run = self.run(object_key, filename, prompt).instrument(span);

        // Dropping `run` on cancellation also removes any temp files it created
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::warn!("Analysis of {} cancelled", object_key);
                Err(AnalyzerError::Interrupted)
            }
            result = run => result,
        }
    }

    async fn run(
        &self,
        object_key: &str,
        filename: Option<&str>,
        prompt: Option<&str>,
    ) -> Result<AnalysisResult> {
        let credentials = self.config.credentials()?;

        let filename = utils::effective_filename(filename, object_key);
        let mime_type = media::guess_mime_type(&filename);
        tracing::info!("Analyzing {} as {} ({})", object_key, filename, mime_type);

        let source = self.storage.open(object_key).await?;
        let prepared = self.preparer.prepare(source, &filename, mime_type).await?;
        let uploaded_as = prepared.filename.clone();

        let asset_id = self.upload(prepared).await?;
        let asset_wait = self.wait_for_asset(&asset_id).await?;

        let indexed_asset_id = self.submit_for_indexing(&credentials, &asset_id).await?;
        let index_wait = self.wait_for_indexing(&credentials, &indexed_asset_id).await?;
        tracing::info!(
            "Remote processing took {} over {} status check(s)",
            utils::format_elapsed(asset_wait.elapsed + index_wait.elapsed),
            asset_wait.checks + index_wait.checks
        );

        let details = self
            .client
            .retrieve_indexed_asset(&credentials.index_id, &indexed_asset_id, true)
            .await?;
        let transcript = format_transcript(details.transcription.as_deref().unwrap_or_default());
        tracing::info!("Transcript has {} line(s)", transcript.lines().count());

        let resolved = VideoIdResolver::new(self.client.as_ref(), &credentials.index_id)
            .resolve(&filename, &details)
            .await?;

        let prompt = self.effective_prompt(prompt);
        tracing::info!("Requesting analysis for video {}", resolved.video_id);
        let analysis = self.client.analyze(&resolved.video_id, prompt).await?;

        Ok(AnalysisResult {
            transcript,
            analysis,
            video_id: resolved.video_id,
            resolved_by: resolved.tier,
            asset_id,
            indexed_asset_id,
            uploaded_as,
            completed_at: Utc::now(),
        })
    }

    /// Upload the prepared file; temp files are removed as soon as the call returns
    async fn upload(&self, prepared: PreparedUpload) -> Result<String> {
        let PreparedUpload {
            stream,
            filename,
            mime_type,
            size,
            artifacts,
        } = prepared;

        tracing::info!(
            "Uploading {} ({})",
            filename,
            size.map(utils::format_file_size).unwrap_or_else(|| "unknown size".to_string())
        );

        let created = self
            .client
            .create_asset(AssetUpload {
                filename,
                mime_type,
                size,
                stream,
            })
            .await;
        artifacts.release();

        let created = created?;
        let asset_id = created
            .non_empty_id()
            .ok_or_else(|| AnalyzerError::Upload("missing asset ID".to_string()))?
            .to_string();

        tracing::info!("Created asset {}", asset_id);
        Ok(asset_id)
    }

    async fn wait_for_asset(&self, asset_id: &str) -> Result<PollReport> {
        let client = self.client.as_ref();
        self.poller
            .await_terminal(JobKind::AssetProcessing, || async move {
                Ok(client.retrieve_asset(asset_id).await?.status())
            })
            .await
    }

    async fn submit_for_indexing(&self, credentials: &Credentials, asset_id: &str) -> Result<String> {
        let indexed = self
            .client
            .create_indexed_asset(&credentials.index_id, asset_id)
            .await?;

        let indexed_asset_id = indexed
            .non_empty_id()
            .ok_or_else(|| AnalyzerError::Indexing("missing indexed asset ID".to_string()))?
            .to_string();

        tracing::info!(
            "Indexing asset {} into {} as {}",
            asset_id,
            credentials.index_id,
            indexed_asset_id
        );
        Ok(indexed_asset_id)
    }

    async fn wait_for_indexing(&self, credentials: &Credentials, indexed_asset_id: &str) -> Result<PollReport> {
        let client = self.client.as_ref();
        let index_id = credentials.index_id.as_str();
        self.poller
            .await_terminal(JobKind::Indexing, || async move {
                Ok(client
                    .retrieve_indexed_asset(index_id, indexed_asset_id, false)
                    .await?
                    .status())
            })
            .await
    }

    fn effective_prompt<'a>(&'a self, prompt: Option<&'a str>) -> &'a str {
        prompt
            .filter(|p| !p.trim().is_empty())
            .or_else(|| {
                self.config
                    .analysis
                    .default_prompt
                    .as_deref()
                    .filter(|p| !p.trim().is_empty())
            })
            .unwrap_or(DEFAULT_ANALYSIS_PROMPT)
    }
}

/// Analyze a stored recording with collaborators built from `config`.
///
/// Credentials are checked before anything else, so a missing API key or
/// index id fails without touching storage or the network.
pub async fn analyze_video_from_storage(
    config: Config,
    object_key: &str,
    filename: Option<&str>,
    prompt: Option<&str>,
) -> Result<AnalysisResult> {
    AnalysisPipeline::from_config(config)?
        .analyze(object_key, filename, prompt)
        .await
}
