// StreamSelector - picks what to download from a catalog
//
// Handles:
// - "highest": largest progressive resolution in the target container
// - exact progressive match on resolution
// - adaptive fallback: matching video-only track + best audio-only track
// - audio-only picks with an observable fallback to the best bitrate
//
// Ties are always broken by catalog order (first wins). Selection never
// copies descriptors; everything returned borrows from the catalog.

use super::errors::DownloadError;
use super::models::{
    Quality, QualityLabel, SelectionRequest, StreamCatalog, StreamDescriptor, StreamKind,
    TrackKind,
};

/// Outcome of a selection
#[derive(Debug, Clone, PartialEq)]
pub enum Selection<'a> {
    /// One stream that can be fetched as-is
    Single(&'a StreamDescriptor),
    /// Video-only and audio-only tracks that need merging
    Pair {
        video: &'a StreamDescriptor,
        audio: &'a StreamDescriptor,
    },
    /// Audio-only pick; `fell_back_from` is set when the requested bitrate
    /// was missing and the best available stream was substituted
    Audio {
        stream: &'a StreamDescriptor,
        fell_back_from: Option<String>,
    },
    /// Nothing matches; the caller decides how to present this
    NotFound,
}

impl<'a> Selection<'a> {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    pub fn needs_merge(&self) -> bool {
        matches!(self, Self::Pair { .. })
    }
}

pub struct StreamSelector;

impl StreamSelector {
    /// Select a stream or a stream pair for the request.
    /// Only malformed quality labels produce an `Err`.
    pub fn select<'a>(
        catalog: &'a StreamCatalog,
        request: &SelectionRequest,
    ) -> Result<Selection<'a>, DownloadError> {
        match request.track {
            TrackKind::VideoAudio => Self::select_combined(catalog, request),
            TrackKind::Video => Self::select_video_track(catalog, request),
            TrackKind::Audio => Self::select_audio(catalog, request),
        }
    }

    fn select_combined<'a>(
        catalog: &'a StreamCatalog,
        request: &SelectionRequest,
    ) -> Result<Selection<'a>, DownloadError> {
        let progressive = Self::of_kind(catalog, StreamKind::Progressive, &request.container);

        let wanted = match &request.quality {
            Quality::Highest => {
                return Ok(Self::max_by_label(&progressive, |s| s.resolution.as_deref())
                    .map_or(Selection::NotFound, Selection::Single));
            }
            Quality::Label(label) => QualityLabel::parse(label)?,
        };

        if let Some(stream) = Self::find_by_label(&progressive, &wanted, |s| s.resolution.as_deref()) {
            return Ok(Selection::Single(stream));
        }

        // No progressive match: try an adaptive video + audio pair
        let video = Self::find_by_label(
            &Self::of_kind(catalog, StreamKind::AdaptiveVideo, &request.container),
            &wanted,
            |s| s.resolution.as_deref(),
        );
        let audio = Self::best_audio(catalog, &request.audio_container);

        Ok(match (video, audio) {
            (Some(video), Some(audio)) => Selection::Pair { video, audio },
            _ => Selection::NotFound,
        })
    }

    fn select_video_track<'a>(
        catalog: &'a StreamCatalog,
        request: &SelectionRequest,
    ) -> Result<Selection<'a>, DownloadError> {
        let candidates = Self::of_kind(catalog, StreamKind::AdaptiveVideo, &request.container);

        let found = match &request.quality {
            Quality::Highest => Self::max_by_label(&candidates, |s| s.resolution.as_deref()),
            Quality::Label(label) => {
                let wanted = QualityLabel::parse(label)?;
                Self::find_by_label(&candidates, &wanted, |s| s.resolution.as_deref())
            }
        };

        Ok(found.map_or(Selection::NotFound, Selection::Single))
    }

    /// Audio-only selection. An exact-bitrate miss falls back to the best
    /// audio stream and reports the substitution.
    pub fn select_audio<'a>(
        catalog: &'a StreamCatalog,
        request: &SelectionRequest,
    ) -> Result<Selection<'a>, DownloadError> {
        let best = Self::best_audio(catalog, &request.audio_container);

        let label = match &request.quality {
            Quality::Highest => {
                return Ok(best.map_or(Selection::NotFound, |stream| Selection::Audio {
                    stream,
                    fell_back_from: None,
                }));
            }
            Quality::Label(label) => label,
        };

        let wanted = QualityLabel::parse(label)?;
        let exact = Self::find_by_label(
            &Self::of_kind(catalog, StreamKind::AdaptiveAudio, &request.audio_container),
            &wanted,
            |s| s.bitrate.as_deref(),
        );

        Ok(match (exact, best) {
            (Some(stream), _) => Selection::Audio {
                stream,
                fell_back_from: None,
            },
            (None, Some(stream)) => Selection::Audio {
                stream,
                fell_back_from: Some(label.clone()),
            },
            (None, None) => Selection::NotFound,
        })
    }

    /// Highest-bitrate audio-only stream of the container
    pub fn best_audio<'a>(
        catalog: &'a StreamCatalog,
        container: &str,
    ) -> Option<&'a StreamDescriptor> {
        Self::max_by_label(
            &Self::of_kind(catalog, StreamKind::AdaptiveAudio, container),
            |s| s.bitrate.as_deref(),
        )
    }

    /// Locator of the stream that would be picked, for use in an external
    /// download manager. Pairs resolve to their video track.
    pub fn direct_locator<'a>(
        catalog: &'a StreamCatalog,
        request: &SelectionRequest,
    ) -> Result<Option<&'a str>, DownloadError> {
        let selection = Self::select(catalog, request)?;
        Ok(match selection {
            Selection::Single(stream) | Selection::Audio { stream, .. } => Some(stream.locator.as_str()),
            Selection::Pair { video, .. } => Some(video.locator.as_str()),
            // A link needs no audio partner
            Selection::NotFound
                if request.track == TrackKind::VideoAudio
                    && matches!(request.quality, Quality::Label(_)) =>
            {
                match Self::select_video_track(catalog, request)? {
                    Selection::Single(stream) => Some(stream.locator.as_str()),
                    _ => None,
                }
            }
            Selection::NotFound => None,
        })
    }

    /// Distinct resolution labels of every stream in `container`, largest first
    pub fn video_qualities(catalog: &StreamCatalog, container: &str) -> Vec<String> {
        let labels = catalog
            .streams()
            .iter()
            .filter(|s| s.kind.has_video() && s.container == container)
            .filter_map(|s| s.resolution.as_deref());
        Self::sorted_labels(labels)
    }

    /// "highest" followed by distinct audio bitrate labels, largest first
    pub fn audio_qualities(catalog: &StreamCatalog, container: &str) -> Vec<String> {
        let audio = Self::of_kind(catalog, StreamKind::AdaptiveAudio, container);
        let labels = audio.iter().filter_map(|s| s.bitrate.as_deref());
        let mut out = vec![Quality::HIGHEST.to_string()];
        out.extend(Self::sorted_labels(labels));
        out
    }

    fn of_kind<'a>(
        catalog: &'a StreamCatalog,
        kind: StreamKind,
        container: &str,
    ) -> Vec<&'a StreamDescriptor> {
        catalog
            .streams()
            .iter()
            .filter(|s| s.kind == kind && s.container == container)
            .collect()
    }

    /// First stream whose label equals `wanted`. Entries whose own label
    /// does not parse are skipped.
    fn find_by_label<'a, F>(
        streams: &[&'a StreamDescriptor],
        wanted: &QualityLabel,
        label_of: F,
    ) -> Option<&'a StreamDescriptor>
    where
        F: Fn(&StreamDescriptor) -> Option<&str>,
    {
        streams.iter().copied().find(|&stream| {
            label_of(stream)
                .and_then(|label| QualityLabel::parse(label).ok())
                .map_or(false, |label| label == *wanted)
        })
    }

    /// Stream with the numerically largest label; earliest wins a tie
    fn max_by_label<'a, F>(
        streams: &[&'a StreamDescriptor],
        label_of: F,
    ) -> Option<&'a StreamDescriptor>
    where
        F: Fn(&StreamDescriptor) -> Option<&str>,
    {
        let mut best: Option<(u32, &'a StreamDescriptor)> = None;
        for &stream in streams {
            let Some(Ok(label)) = label_of(stream).map(QualityLabel::parse) else {
                continue;
            };
            if best.map_or(true, |(top, _)| label.value > top) {
                best = Some((label.value, stream));
            }
        }
        best.map(|(_, stream)| stream)
    }

    fn sorted_labels<'a>(labels: impl Iterator<Item = &'a str>) -> Vec<String> {
        let mut parsed: Vec<(u32, String)> = Vec::new();
        for label in labels {
            let Ok(quality) = QualityLabel::parse(label) else {
                continue;
            };
            if !parsed.iter().any(|(_, l)| l == label) {
                parsed.push((quality.value, label.to_string()));
            }
        }
        parsed.sort_by(|a, b| b.0.cmp(&a.0));
        parsed.into_iter().map(|(_, label)| label).collect()
    }
}
