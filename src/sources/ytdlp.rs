use async_trait::async_trait;
use reqwest::{header::RANGE, Client};
use serde::Deserialize;
use songbird::input::{HttpRequest, Input};
use std::{path::PathBuf, time::Duration};
use tracing::{debug, info, warn};
use url::Url;

use super::MediaResolver;
use crate::{
    audio::track::{StreamHandle, Track, TrackInfo},
    error::ResolutionError,
};

/// Bytes pedidos al verificar que un stream tiene datos
const PROBE_BYTES: u32 = 1024;

/// Resolves queries with `yt-dlp` and streams the audio over HTTP.
pub struct YtDlpResolver {
    binary: PathBuf,
    timeout: Duration,
    client: Client,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
            client: Client::new(),
        }
    }

    /// Checks that the configured binary runs.
    pub async fn verify(&self) -> anyhow::Result<()> {
        let output = tokio::process::Command::new(&self.binary)
            .arg("--version")
            .output()
            .await?;

        if !output.status.success() {
            anyhow::bail!("yt-dlp no disponible en {}", self.binary.display());
        }
        info!(
            "✅ yt-dlp versión: {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(())
    }

    /// Runs yt-dlp and returns the metadata of the first match.
    async fn extract(&self, query: &str) -> Result<VideoInfo, ResolutionError> {
        let target = search_target(query);
        debug!("🔍 yt-dlp: {}", target);

        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.args([
            "--dump-json",
            "--no-playlist",
            "--format",
            "bestaudio/best",
            "--default-search",
            "ytsearch",
            "--quiet",
            "--no-warnings",
            "--socket-timeout",
            "15",
        ])
        .arg(&target)
        .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                ResolutionError::UpstreamUnavailable(format!(
                    "yt-dlp no respondió en {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| ResolutionError::UpstreamUnavailable(format!("no se pudo ejecutar yt-dlp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("yt-dlp falló para {}: {}", query, stderr.trim());
            return Err(classify_failure(query, &stderr));
        }

        parse_first(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| ResolutionError::NotFound(query.to_string()))
    }

    /// Opens `stream_url`, failing when it yields no bytes.
    async fn open_stream(&self, stream_url: &str) -> Result<StreamHandle, ResolutionError> {
        let response = self
            .client
            .get(stream_url)
            .header(RANGE, format!("bytes=0-{}", PROBE_BYTES - 1))
            .send()
            .await
            .map_err(|e| ResolutionError::UpstreamUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ResolutionError::UpstreamUnavailable(format!(
                "HTTP {} al abrir el stream",
                response.status()
            )));
        }

        let probe = response
            .bytes()
            .await
            .map_err(|e| ResolutionError::UpstreamUnavailable(e.to_string()))?;
        if probe.is_empty() {
            return Err(ResolutionError::EmptyStream(stream_url.to_string()));
        }

        let input: Input = HttpRequest::new(self.client.clone(), stream_url.to_string()).into();
        Ok(StreamHandle::new(stream_url, input))
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> Result<Track, ResolutionError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResolutionError::NotFound(String::new()));
        }

        let info = self.extract(query).await?.into_track_info();
        let stream = self.open_stream(&info.stream_url).await?;

        info!("✅ Resuelto: {} ({})", info.title, info.page_url);
        Ok(Track::new(info, stream))
    }

    async fn reopen(&self, info: &TrackInfo) -> Result<StreamHandle, ResolutionError> {
        // Las URLs directas caducan; se piden de nuevo a partir de la página
        let fresh = self.extract(&info.page_url).await?;
        let stream_url = fresh.url.unwrap_or_else(|| info.stream_url.clone());
        self.open_stream(&stream_url).await
    }
}

/// Direct URLs go to yt-dlp as-is, anything else becomes a one-result search.
fn search_target(query: &str) -> String {
    match Url::parse(query) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => query.to_string(),
        _ => format!("ytsearch1:{query}"),
    }
}

fn classify_failure(query: &str, stderr: &str) -> ResolutionError {
    let lower = stderr.to_lowercase();
    let missing = ["video unavailable", "not found", "no video", "private video", "unsupported url"];
    if missing.iter().any(|needle| lower.contains(needle)) {
        ResolutionError::NotFound(query.to_string())
    } else {
        ResolutionError::UpstreamUnavailable(stderr.trim().to_string())
    }
}

/// Subset of the yt-dlp JSON we care about.
#[derive(Debug, Deserialize)]
struct VideoInfo {
    title: String,
    uploader: Option<String>,
    duration: Option<f64>,
    webpage_url: String,
    url: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

impl VideoInfo {
    fn into_track_info(self) -> TrackInfo {
        let mut info = TrackInfo::new(self.title, self.webpage_url.clone())
            .with_stream_url(self.url.unwrap_or(self.webpage_url))
            .with_tags(self.tags.unwrap_or_default());

        if let Some(uploader) = self.uploader {
            info = info.with_uploader(uploader);
        }
        if let Some(secs) = self.duration.filter(|d| d.is_finite() && *d >= 0.0) {
            info = info.with_duration(Duration::from_secs_f64(secs));
        }
        if let Some(thumbnail) = self.thumbnail {
            info = info.with_thumbnail(thumbnail);
        }
        info
    }
}

/// yt-dlp prints one JSON object per line; the first one that parses wins.
fn parse_first(stdout: &str) -> Option<VideoInfo> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .find_map(|line| match serde_json::from_str(line) {
            Ok(info) => Some(info),
            Err(e) => {
                debug!("Línea de yt-dlp ignorada: {}", e);
                None
            }
        })
}
