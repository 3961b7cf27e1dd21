use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

pub mod ffmpeg;

pub use ffmpeg::{FfmpegTranscoder, Transcoder};

use crate::storage::{ByteStream, SourceFile};
use crate::utils;
use crate::Result;

pub const MIME_OCTET_STREAM: &str = "application/octet-stream";
pub const MIME_WEBM: &str = "video/webm";
pub const MIME_MP4: &str = "video/mp4";

/// Container formats recognised from file extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    Mp4,
    M4v,
    Mov,
    Webm,
    Mkv,
    Avi,
    Mp3,
    M4a,
    Wav,
    Ogg,
}

impl MediaFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFormat::Mp4 => "mp4",
            MediaFormat::M4v => "m4v",
            MediaFormat::Mov => "mov",
            MediaFormat::Webm => "webm",
            MediaFormat::Mkv => "mkv",
            MediaFormat::Avi => "avi",
            MediaFormat::Mp3 => "mp3",
            MediaFormat::M4a => "m4a",
            MediaFormat::Wav => "wav",
            MediaFormat::Ogg => "ogg",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp4" => Some(MediaFormat::Mp4),
            "m4v" => Some(MediaFormat::M4v),
            "mov" | "qt" => Some(MediaFormat::Mov),
            "webm" => Some(MediaFormat::Webm),
            "mkv" => Some(MediaFormat::Mkv),
            "avi" => Some(MediaFormat::Avi),
            "mp3" => Some(MediaFormat::Mp3),
            "m4a" => Some(MediaFormat::M4a),
            "wav" => Some(MediaFormat::Wav),
            "ogg" | "oga" => Some(MediaFormat::Ogg),
            _ => None,
        }
    }

    pub fn from_filename(filename: &str) -> Option<Self> {
        Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Get MIME type for the format
    pub fn mime_type(&self) -> &'static str {
        match self {
            MediaFormat::Mp4 => MIME_MP4,
            MediaFormat::M4v => "video/x-m4v",
            MediaFormat::Mov => "video/quicktime",
            MediaFormat::Webm => MIME_WEBM,
            MediaFormat::Mkv => "video/x-matroska",
            MediaFormat::Avi => "video/x-msvideo",
            MediaFormat::Mp3 => "audio/mpeg",
            MediaFormat::M4a => "audio/mp4",
            MediaFormat::Wav => "audio/x-wav",
            MediaFormat::Ogg => "audio/ogg",
        }
    }
}

/// MIME type guessed from the filename, or `application/octet-stream`
pub fn guess_mime_type(filename: &str) -> &'static str {
    MediaFormat::from_filename(filename)
        .map(|format| format.mime_type())
        .unwrap_or(MIME_OCTET_STREAM)
}

/// WebM recordings cannot be ingested directly and must be transcoded
pub fn needs_transcoding(filename: &str, mime_type: &str) -> bool {
    mime_type == MIME_WEBM || filename.to_lowercase().ends_with(".webm")
}

/// Temporary files that must be removed once the upload call has returned.
///
/// Removal happens exactly once, either through [`TempArtifacts::release`] or
/// when the value is dropped. Failures are logged and otherwise ignored.
#[derive(Debug, Default)]
pub struct TempArtifacts {
    paths: Vec<PathBuf>,
}

impl TempArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Delete every collected path now
    pub fn release(mut self) {
        self.remove_all();
    }

    fn remove_all(&mut self) {
        for path in self.paths.drain(..) {
            match fs_err::remove_file(&path) {
                Ok(()) => tracing::debug!("Removed temporary file {}", path.display()),
                Err(e) => tracing::debug!("Ignoring cleanup failure: {}", e),
            }
        }
    }
}

impl Drop for TempArtifacts {
    fn drop(&mut self) {
        self.remove_all();
    }
}

/// Stream plus metadata ready to be sent to the asset endpoint
pub struct PreparedUpload {
    pub stream: ByteStream,
    pub filename: String,
    pub mime_type: String,
    pub size: Option<u64>,
    pub artifacts: TempArtifacts,
}

impl std::fmt::Debug for PreparedUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedUpload")
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("size", &self.size)
            .field("artifacts", &self.artifacts)
            .finish_non_exhaustive()
    }
}

/// Turns a source recording into something the service can ingest
pub struct MediaPreparer {
    transcoder: Arc<dyn Transcoder>,
    temp_dir: Option<PathBuf>,
}

impl MediaPreparer {
    pub fn new(transcoder: Arc<dyn Transcoder>, temp_dir: Option<PathBuf>) -> Self {
        Self {
            transcoder,
            temp_dir,
        }
    }

    /// Pass the source through, or transcode it to MP4 when it is WebM
    pub async fn prepare(
        &self,
        source: SourceFile,
        filename: &str,
        mime_type: &str,
    ) -> Result<PreparedUpload> {
        if !needs_transcoding(filename, mime_type) {
            tracing::debug!("{} ({}) can be uploaded as is", filename, mime_type);
            return Ok(PreparedUpload {
                stream: source.stream,
                filename: filename.to_string(),
                mime_type: mime_type.to_string(),
                size: source.size,
                artifacts: TempArtifacts::new(),
            });
        }

        self.transcode_to_mp4(source.stream, filename).await
    }

    async fn transcode_to_mp4(&self, mut stream: ByteStream, filename: &str) -> Result<PreparedUpload> {
        self.transcoder.ensure_available()?;

        // Dropping `artifacts` on any early return removes whatever was created so far.
        let mut artifacts = TempArtifacts::new();

        let src_suffix = utils::dotted_extension(filename).unwrap_or_else(|| ".webm".to_string());
        let (src_file, src_path) = self.temp_file(&src_suffix)?;
        artifacts.push(src_path.clone());

        let mut src_file = tokio::fs::File::from_std(src_file);
        let copied = tokio::io::copy(&mut stream, &mut src_file).await?;
        src_file.flush().await?;
        drop(src_file);
        drop(stream);

        let (_, dst_path) = self.temp_file(".mp4")?;
        artifacts.push(dst_path.clone());

        tracing::info!(
            "Transcoding {} ({}) to MP4",
            filename,
            utils::format_file_size(copied)
        );
        self.transcoder.transcode(&src_path, &dst_path).await?;

        let output = tokio::fs::File::open(&dst_path).await?;
        let size = output.metadata().await.ok().map(|m| m.len());

        Ok(PreparedUpload {
            stream: Box::new(output),
            filename: utils::replace_extension(filename, MediaFormat::Mp4.as_str()),
            mime_type: MIME_MP4.to_string(),
            size,
            artifacts,
        })
    }

    fn temp_file(&self, suffix: &str) -> Result<(std::fs::File, PathBuf)> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("recording-").suffix(suffix);

        let named = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        let (file, path) = named.keep().map_err(std::io::Error::from)?;
        Ok((file, path))
    }
}
