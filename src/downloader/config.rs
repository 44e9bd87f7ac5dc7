// Configuration for downloader components
//
// Every section has serde defaults so a partial TOML file is enough:
//
//   [retry]
//   max_attempts = 5
//
//   [muxer]
//   program = "/usr/local/bin/ffmpeg"

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::errors::DownloadError;

/// Retry policy for catalog resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt, in seconds
    pub delay_secs: f64,
    /// Multiplier applied to the delay after each failure (1.0 = fixed delay)
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_secs: 3.0,
            backoff_factor: 1.0,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_secs = delay.as_secs_f64();
        self
    }

    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Longest wait between two attempts
    pub const MAX_DELAY: Duration = Duration::from_secs(3600);

    /// Delay to wait after the given failed attempt (1-based), capped at `MAX_DELAY`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = self.backoff_factor.max(1.0).powi(exponent);
        Duration::try_from_secs_f64((self.delay_secs * factor).max(0.0))
            .map_or(Self::MAX_DELAY, |delay| delay.min(Self::MAX_DELAY))
    }

    fn validate(&self) -> Result<(), DownloadError> {
        if !self.delay_secs.is_finite() || self.delay_secs < 0.0 {
            return Err(DownloadError::ParseError(format!(
                "retry.delay_secs must be a non-negative number, got {}",
                self.delay_secs
            )));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 0.0 {
            return Err(DownloadError::ParseError(format!(
                "retry.backoff_factor must be a non-negative number, got {}",
                self.backoff_factor
            )));
        }
        Ok(())
    }
}

/// External multiplexer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuxerConfig {
    /// Binary name or path
    pub program: String,
    /// Upper bound on one merge run
    pub timeout_secs: u64,
}

impl Default for MuxerConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            timeout_secs: 600,
        }
    }
}

impl MuxerConfig {
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_secs = seconds;
        self
    }
}

/// Network configuration for byte transfers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// SOCKS5/HTTP proxy URL (e.g., "socks5://127.0.0.1:1080")
    pub proxy: Option<String>,

    /// Honour HTTP_PROXY / HTTPS_PROXY when no explicit proxy is set
    pub system_proxy: bool,

    /// Timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Size of each HTTP range request when the stream size is known
    pub range_chunk_size: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            system_proxy: true,
            timeout_secs: Some(30),
            range_chunk_size: Some(1024 * 1024),
        }
    }
}

/// Configuration for the yt-dlp catalog provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// yt-dlp binary name or path
    pub program: String,
    /// SOCKS5/HTTP proxy URL
    pub proxy: Option<String>,
    /// Path to cookies.txt file
    pub cookies_path: Option<String>,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            program: "yt-dlp".to_string(),
            proxy: None,
            cookies_path: None,
            timeout_seconds: 60,
        }
    }
}

impl ExtractorConfig {
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_cookies_path(mut self, path: Option<String>) -> Self {
        self.cookies_path = path;
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    pub retry: RetryPolicy,
    pub muxer: MuxerConfig,
    pub network: NetworkConfig,
    pub extractor: ExtractorConfig,
    /// Where merge intermediates are written
    pub temp_dir: PathBuf,
    /// Where the CLI saves finished downloads
    pub output_dir: PathBuf,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            muxer: MuxerConfig::default(),
            network: NetworkConfig::default(),
            extractor: ExtractorConfig::default(),
            temp_dir: std::env::temp_dir(),
            output_dir: dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

impl DownloaderConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, DownloadError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| DownloadError::ParseError(format!("Invalid config: {}", e)))?;
        config.retry.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, DownloadError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DownloadError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_muxer(mut self, muxer: MuxerConfig) -> Self {
        self.muxer = muxer;
        self
    }

    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }
}
