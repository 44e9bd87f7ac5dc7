// Error types for downloader operations

use thiserror::Error;

/// Longest diagnostic excerpt kept from a failed muxer run
pub const DIAGNOSTICS_LIMIT: usize = 500;

#[derive(Debug, Clone, Error)]
pub enum DownloadError {
    /// Catalog lookup kept failing on connectivity until the retry budget ran out
    #[error("Failed to connect after {attempts} attempts: {last}")]
    ConnectionExhausted { attempts: u32, last: Box<DownloadError> },

    /// One transient connectivity failure (timeout, reset, DNS)
    #[error("Connection error: {0}")]
    Connectivity(String),

    /// Provider could not resolve the URL for a non-transient reason
    #[error("Could not resolve resource: {0}")]
    Resolution(String),

    /// Quality label or provider output could not be interpreted
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Nothing in the catalog matches the requested quality
    #[error("No stream found for {quality}")]
    NotFound { quality: String },

    /// ffmpeg or yt-dlp not found in system
    #[error("Tool not found: {0}")]
    ToolUnavailable(String),

    /// Muxer ran but did not produce a usable file
    #[error("Merge failed: {reason}")]
    MergeFailed { reason: String, diagnostics: String },

    /// Byte transfer for a resolved stream aborted
    #[error("Transfer of stream {stream_id} failed: {reason}")]
    TransferFailed { stream_id: String, reason: String },

    /// Local filesystem failure outside of a transfer
    #[error("I/O error: {0}")]
    Io(String),
}

/// What the user should do about a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connectivity; the same request may succeed later
    TryAgain,
    /// The catalog does not have that quality
    PickAnotherQuality,
    /// A required binary is missing
    FixEnvironment,
    /// Nothing the user can change will help
    Unrecoverable,
}

impl DownloadError {
    pub fn merge_failed(reason: impl Into<String>, diagnostics: &str) -> Self {
        Self::MergeFailed {
            reason: reason.into(),
            diagnostics: truncate_diagnostics(diagnostics),
        }
    }

    /// Check if the catalog lookup is worth repeating
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ConnectionExhausted { .. } | Self::Connectivity(_) | Self::TransferFailed { .. } => {
                FailureKind::TryAgain
            }
            Self::NotFound { .. } => FailureKind::PickAnotherQuality,
            Self::ToolUnavailable(_) => FailureKind::FixEnvironment,
            Self::Resolution(_) | Self::ParseError(_) | Self::MergeFailed { .. } | Self::Io(_) => {
                FailureKind::Unrecoverable
            }
        }
    }

    /// Human-readable message for display
    pub fn user_message(&self) -> String {
        match self.kind() {
            FailureKind::TryAgain => format!(
                "{}\n\nThis looks like a connection problem. Check your network and try again.",
                self
            ),
            FailureKind::PickAnotherQuality => format!(
                "{}\n\nPick a different quality from the list.",
                self
            ),
            FailureKind::FixEnvironment => format!(
                "{}\n\nThis quality needs audio and video merged. Install ffmpeg and make sure it is on PATH.",
                self
            ),
            FailureKind::Unrecoverable => match self {
                Self::MergeFailed { diagnostics, .. } if !diagnostics.is_empty() => {
                    format!("{}\n\nffmpeg said:\n{}", self, diagnostics)
                }
                _ => self.to_string(),
            },
        }
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Map extractor stderr onto the taxonomy
pub fn classify_provider_output(s: &str) -> DownloadError {
    let lower = s.to_lowercase();

    if lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("connection reset")
        || lower.contains("connection refused")
        || lower.contains("temporary failure in name resolution")
        || lower.contains("network is unreachable")
        || lower.contains("urlopen error")
    {
        return DownloadError::Connectivity(s.trim().to_string());
    }

    if lower.contains("command not found") || lower.contains("no such file") {
        return DownloadError::ToolUnavailable(s.trim().to_string());
    }

    if lower.contains("invalid json") || lower.contains("parse") {
        return DownloadError::ParseError(s.trim().to_string());
    }

    DownloadError::Resolution(s.trim().to_string())
}

fn truncate_diagnostics(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.chars().count() <= DIAGNOSTICS_LIMIT {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(DIAGNOSTICS_LIMIT).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_connectivity() {
        let err = classify_provider_output("ERROR: <urlopen error [Errno 110] Connection timed out>");
        assert!(err.is_transient());
        assert_eq!(err.kind(), FailureKind::TryAgain);
    }

    #[test]
    fn test_classify_resolution() {
        let err = classify_provider_output("ERROR: [youtube] abc: Video unavailable");
        assert!(matches!(err, DownloadError::Resolution(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_merge_diagnostics_truncated() {
        let long = "x".repeat(2000);
        match DownloadError::merge_failed("ffmpeg exited with 1", &long) {
            DownloadError::MergeFailed { diagnostics, .. } => {
                assert_eq!(diagnostics.len(), DIAGNOSTICS_LIMIT + 3);
                assert!(diagnostics.ends_with("..."));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_user_messages_distinguish_kinds() {
        let retry = DownloadError::ConnectionExhausted {
            attempts: 3,
            last: Box::new(DownloadError::Connectivity("reset".to_string())),
        };
        let quality = DownloadError::NotFound { quality: "1080p".to_string() };
        let tool = DownloadError::ToolUnavailable("ffmpeg".to_string());

        assert!(retry.user_message().contains("try again"));
        assert!(quality.user_message().contains("different quality"));
        assert!(tool.user_message().contains("Install ffmpeg"));
    }
}
