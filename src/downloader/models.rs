// Common data models for downloader

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::DownloadError;

/// What a single catalog entry carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamKind {
    /// Audio and video muxed together, playable as-is
    Progressive,
    /// Video track only, needs an audio partner
    AdaptiveVideo,
    /// Audio track only
    AdaptiveAudio,
}

impl StreamKind {
    pub fn is_progressive(&self) -> bool {
        matches!(self, Self::Progressive)
    }

    pub fn has_video(&self) -> bool {
        matches!(self, Self::Progressive | Self::AdaptiveVideo)
    }

    /// MIME major type ("video" or "audio")
    pub fn media_type(&self) -> &'static str {
        match self {
            Self::Progressive | Self::AdaptiveVideo => "video",
            Self::AdaptiveAudio => "audio",
        }
    }
}

/// One fetchable variant of a media resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Provider format ID (e.g., "18", "137", "140")
    pub id: String,
    /// Container subtype (mp4, webm)
    pub container: String,
    /// Progressive or adaptive track
    pub kind: StreamKind,
    /// Resolution label for video tracks (e.g., "720p")
    pub resolution: Option<String>,
    /// Bitrate label for audio tracks (e.g., "128kbps")
    pub bitrate: Option<String>,
    /// Approximate size in bytes
    pub size: Option<u64>,
    /// Resolved download URL
    pub locator: String,
}

impl StreamDescriptor {
    /// Full MIME type (e.g., "video/mp4", "audio/mp4")
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.kind.media_type(), self.container)
    }

    /// Label the selector compares against for this entry's kind
    pub fn quality_label(&self) -> Option<&str> {
        match self.kind {
            StreamKind::AdaptiveAudio => self.bitrate.as_deref(),
            _ => self.resolution.as_deref(),
        }
    }
}

/// All stream variants for one resource. Built once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamCatalog {
    resource_id: String,
    title: String,
    streams: Vec<StreamDescriptor>,
}

impl StreamCatalog {
    pub fn new(
        resource_id: impl Into<String>,
        title: impl Into<String>,
        streams: Vec<StreamDescriptor>,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            title: title.into(),
            streams,
        }
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn streams(&self) -> &[StreamDescriptor] {
        &self.streams
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

/// Numeric quality label such as "720p" or "128kbps"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityLabel {
    pub value: u32,
    pub unit: String,
}

impl QualityLabel {
    /// Parse the number in front of a trailing unit suffix.
    /// "720p" -> 720, "160kbps" -> 160. A label with no leading number is an error.
    pub fn parse(label: &str) -> Result<Self, DownloadError> {
        let trimmed = label.trim();
        let number = trimmed.trim_end_matches(|c: char| c.is_ascii_alphabetic());
        let unit = &trimmed[number.len()..];

        let value = number
            .parse::<u32>()
            .map_err(|_| DownloadError::ParseError(format!("Invalid quality label: '{}'", label)))?;

        Ok(Self {
            value,
            unit: unit.to_ascii_lowercase(),
        })
    }
}

impl fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit)
    }
}

/// Requested quality
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Quality {
    /// Best the catalog offers
    #[default]
    Highest,
    /// Explicit resolution or bitrate label
    Label(String),
}

impl Quality {
    pub const HIGHEST: &'static str = "highest";

    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case(Self::HIGHEST) {
            Self::Highest
        } else {
            Self::Label(value.trim().to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Highest => Self::HIGHEST,
            Self::Label(label) => label,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which tracks the caller wants back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TrackKind {
    /// Video track only (no merge)
    Video,
    /// Audio track only
    Audio,
    /// Playable file with both tracks
    #[default]
    VideoAudio,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
            Self::VideoAudio => write!(f, "video+audio"),
        }
    }
}

/// Selection request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRequest {
    pub quality: Quality,
    pub track: TrackKind,
    /// Container for video / progressive entries
    pub container: String,
    /// Container for the adaptive audio partner or audio-only picks
    pub audio_container: String,
}

impl SelectionRequest {
    pub fn new(quality: Quality, track: TrackKind) -> Self {
        Self {
            quality,
            track,
            container: "mp4".to_string(),
            audio_container: "mp4".to_string(),
        }
    }

    pub fn video(quality: &str) -> Self {
        Self::new(Quality::parse(quality), TrackKind::VideoAudio)
    }

    pub fn audio(quality: &str) -> Self {
        Self::new(Quality::parse(quality), TrackKind::Audio)
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = container.into();
        self
    }

    pub fn with_audio_container(mut self, container: impl Into<String>) -> Self {
        self.audio_container = container.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_label_parse() {
        let label = QualityLabel::parse("720p").unwrap();
        assert_eq!(label.value, 720);
        assert_eq!(label.unit, "p");

        let label = QualityLabel::parse("160kbps").unwrap();
        assert_eq!(label.value, 160);
        assert_eq!(label.unit, "kbps");
    }

    #[test]
    fn test_quality_label_rejects_malformed() {
        assert!(matches!(
            QualityLabel::parse("hd"),
            Err(DownloadError::ParseError(_))
        ));
        assert!(QualityLabel::parse("1080p60").is_err());
        assert!(QualityLabel::parse("").is_err());
    }

    #[test]
    fn test_quality_highest_sentinel() {
        assert_eq!(Quality::parse("highest"), Quality::Highest);
        assert_eq!(Quality::parse(" Highest "), Quality::Highest);
        assert_eq!(Quality::parse("720p"), Quality::Label("720p".to_string()));
    }

    #[test]
    fn test_mime_type() {
        let stream = StreamDescriptor {
            id: "140".to_string(),
            container: "mp4".to_string(),
            kind: StreamKind::AdaptiveAudio,
            resolution: None,
            bitrate: Some("128kbps".to_string()),
            size: None,
            locator: "https://example.invalid/140".to_string(),
        };
        assert_eq!(stream.mime_type(), "audio/mp4");
        assert_eq!(stream.quality_label(), Some("128kbps"));
    }

    #[test]
    fn test_catalog_is_read_only() {
        let stream = StreamDescriptor {
            id: "18".to_string(),
            container: "mp4".to_string(),
            kind: StreamKind::Progressive,
            resolution: Some("360p".to_string()),
            bitrate: None,
            size: None,
            locator: "https://example.invalid/18".to_string(),
        };
        let catalog = StreamCatalog::new("abc123", "Title", vec![stream.clone()]);

        assert_eq!(catalog.resource_id(), "abc123");
        assert_eq!(catalog.title(), "Title");
        assert_eq!(catalog.streams(), &[stream][..]);
        assert!(!catalog.is_empty());

        // Serialized form keeps the field names
        let json = serde_json::to_value(&catalog).unwrap();
        assert_eq!(json["streams"][0]["id"], "18");
    }
}
