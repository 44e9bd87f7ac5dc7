// yt-dlp catalog provider - uses the native `yt-dlp` binary
//
// Runs `yt-dlp --dump-json` and maps its `formats` array onto
// StreamDescriptors. Formats without a direct URL (storyboards, some
// manifests) are skipped.

use async_trait::async_trait;

use super::traits::CatalogProvider;
use crate::downloader::config::ExtractorConfig;
use crate::downloader::errors::{classify_provider_output, DownloadError};
use crate::downloader::models::{StreamCatalog, StreamDescriptor, StreamKind};
use crate::downloader::tools::ToolManager;
use crate::downloader::utils::{run_output_with_timeout, RunError};
use tracing::{debug, warn};

/// CLI-based catalog provider using yt-dlp binary
pub struct YtDlpCatalog {
    config: ExtractorConfig,
}

impl YtDlpCatalog {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Build command arguments
    fn build_args(&self, url: &str) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            self.config.timeout_seconds.to_string(),
        ];

        // Cookies
        if let Some(path) = &self.config.cookies_path {
            args.push("--cookies".to_string());
            args.push(path.clone());
        }

        // Proxy
        if let Some(proxy) = &self.config.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        args.push(url.to_string());
        args
    }

    /// Parse yt-dlp JSON output
    pub fn parse_json(stdout: &[u8]) -> Result<StreamCatalog, DownloadError> {
        let json: serde_json::Value = serde_json::from_slice(stdout)
            .map_err(|e| DownloadError::ParseError(format!("Invalid JSON: {}", e)))?;

        let formats = json["formats"]
            .as_array()
            .ok_or_else(|| DownloadError::ParseError("No formats array in JSON".to_string()))?;

        let streams = formats.iter().filter_map(Self::parse_format).collect();

        Ok(StreamCatalog::new(
            json["id"].as_str().unwrap_or("unknown"),
            json["title"].as_str().unwrap_or("Unknown"),
            streams,
        ))
    }

    fn parse_format(f: &serde_json::Value) -> Option<StreamDescriptor> {
        let locator = f["url"].as_str()?.to_string();

        let has = |key: &str| f[key].as_str().map_or(false, |c| c != "none" && !c.is_empty());
        let kind = match (has("vcodec"), has("acodec")) {
            (true, true) => StreamKind::Progressive,
            (true, false) => StreamKind::AdaptiveVideo,
            (false, true) => StreamKind::AdaptiveAudio,
            (false, false) => return None,
        };

        // m4a is the audio flavour of the mp4 container
        let container = match f["ext"].as_str().unwrap_or("") {
            "m4a" => "mp4".to_string(),
            ext => ext.to_string(),
        };

        let resolution = if kind.has_video() {
            f["height"].as_u64().map(|h| format!("{}p", h))
        } else {
            None
        };
        let bitrate = if kind == StreamKind::AdaptiveAudio {
            f["abr"].as_f64().map(|abr| format!("{}kbps", abr.round() as u64))
        } else {
            None
        };

        Some(StreamDescriptor {
            id: f["format_id"].as_str().unwrap_or("").to_string(),
            container,
            kind,
            resolution,
            bitrate,
            size: f["filesize"].as_u64().or_else(|| f["filesize_approx"].as_u64()),
            locator,
        })
    }
}

impl Default for YtDlpCatalog {
    fn default() -> Self {
        Self::new(ExtractorConfig::default())
    }
}

#[async_trait]
impl CatalogProvider for YtDlpCatalog {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn is_available(&self) -> bool {
        ToolManager::locate(&self.config.program).is_some()
    }

    async fn resolve(&self, url: &str) -> Result<StreamCatalog, DownloadError> {
        let program = ToolManager::locate(&self.config.program).ok_or_else(|| {
            DownloadError::ToolUnavailable(format!("{} binary not found", self.config.program))
        })?;
        let program = program.to_string_lossy();

        let args = self.build_args(url);
        debug!("[YtDlpCatalog] {} {}", program, args.join(" "));

        // Leave yt-dlp room to hit its own socket timeout first
        let limit = self.config.timeout_seconds.saturating_mul(2).max(10);
        let output = match run_output_with_timeout(&program, &args, limit).await {
            Ok(out) => out,
            Err(RunError::TimedOut { secs, .. }) => {
                return Err(DownloadError::Connectivity(format!(
                    "yt-dlp did not answer within {}s",
                    secs
                )));
            }
            Err(e) => return Err(DownloadError::ToolUnavailable(e.to_string())),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("[YtDlpCatalog] failed for {}: {}", url, stderr.trim());
            return Err(classify_provider_output(&stderr));
        }

        let catalog = Self::parse_json(&output.stdout)?;
        debug!(
            "[YtDlpCatalog] {} streams for {}",
            catalog.streams().len(),
            catalog.resource_id()
        );
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "id": "dQw4w9WgXcQ",
        "title": "Sample",
        "formats": [
            {"format_id": "sb0", "ext": "mhtml", "vcodec": "none", "acodec": "none", "url": "https://i.invalid/sb"},
            {"format_id": "139", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.5", "abr": 48.801, "filesize": 1000, "url": "https://cdn.invalid/139"},
            {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2", "abr": 129.5, "filesize_approx": 3000, "url": "https://cdn.invalid/140"},
            {"format_id": "18", "ext": "mp4", "vcodec": "avc1.42001E", "acodec": "mp4a.40.2", "height": 360, "url": "https://cdn.invalid/18"},
            {"format_id": "137", "ext": "mp4", "vcodec": "avc1.640028", "acodec": "none", "height": 1080, "filesize": 90000, "url": "https://cdn.invalid/137"},
            {"format_id": "248", "ext": "webm", "vcodec": "vp9", "acodec": "none", "height": 1080},
            {"format_id": "251", "ext": "webm", "vcodec": "none", "acodec": "opus", "abr": 160.0, "url": "https://cdn.invalid/251"}
        ]
    }"#;

    #[test]
    fn test_parse_formats() {
        let catalog = YtDlpCatalog::parse_json(SAMPLE.as_bytes()).unwrap();

        assert_eq!(catalog.resource_id(), "dQw4w9WgXcQ");
        assert_eq!(catalog.title(), "Sample");
        // storyboard and the url-less webm are skipped
        assert_eq!(catalog.streams().len(), 5);

        let audio = &catalog.streams()[1];
        assert_eq!(audio.kind, StreamKind::AdaptiveAudio);
        assert_eq!(audio.container, "mp4");
        assert_eq!(audio.bitrate.as_deref(), Some("130kbps"));
        assert_eq!(audio.size, Some(3000));

        let progressive = &catalog.streams()[2];
        assert_eq!(progressive.kind, StreamKind::Progressive);
        assert_eq!(progressive.resolution.as_deref(), Some("360p"));
        assert_eq!(progressive.size, None);

        let video = &catalog.streams()[3];
        assert_eq!(video.kind, StreamKind::AdaptiveVideo);
        assert_eq!(video.resolution.as_deref(), Some("1080p"));
        assert_eq!(video.mime_type(), "video/mp4");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            YtDlpCatalog::parse_json(b"<html>"),
            Err(DownloadError::ParseError(_))
        ));
        assert!(matches!(
            YtDlpCatalog::parse_json(b"{\"id\": \"x\"}"),
            Err(DownloadError::ParseError(_))
        ));
    }

    #[test]
    fn test_build_args() {
        let provider = YtDlpCatalog::new(
            ExtractorConfig::default()
                .with_proxy(Some("socks5://127.0.0.1:1080".to_string()))
                .with_cookies_path(Some("/tmp/cookies.txt".to_string())),
        );
        let args = provider.build_args("https://youtu.be/x");

        assert_eq!(args.first().map(String::as_str), Some("--dump-json"));
        assert!(args.windows(2).any(|w| w[0] == "--proxy" && w[1] == "socks5://127.0.0.1:1080"));
        assert!(args.windows(2).any(|w| w[0] == "--cookies" && w[1] == "/tmp/cookies.txt"));
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/x"));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let provider = YtDlpCatalog::new(ExtractorConfig {
            program: "no-such-yt-dlp-3e9d".to_string(),
            ..ExtractorConfig::default()
        });
        assert!(!provider.is_available());
        let err = provider.resolve("https://youtu.be/x").await.unwrap_err();
        assert!(matches!(err, DownloadError::ToolUnavailable(_)));
    }
}
