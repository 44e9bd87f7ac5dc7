// Downloader - resolve, select, then fetch directly or merge

use std::sync::Arc;
use tracing::{info, warn};

use super::cache::{BufferCache, CacheKey};
use super::config::{DownloaderConfig, RetryPolicy};
use super::errors::DownloadError;
use super::extractors::{resolve_catalog, CatalogProvider, YtDlpCatalog};
use super::fetcher::{HttpFetcher, MemorySink};
use super::format_selector::{Selection, StreamSelector};
use super::merge::MergeExecutor;
use super::models::{SelectionRequest, StreamCatalog, StreamDescriptor, TrackKind};
use super::traits::{ProgressObserver, ResourceFetcher};
use super::utils::sanitize_filename;

/// A finished download held in memory
#[derive(Debug, Clone)]
pub struct DownloadOutput {
    pub resource_id: String,
    pub title: String,
    /// Quality as requested by the caller
    pub quality: String,
    pub track: TrackKind,
    pub container: String,
    pub bytes: Arc<[u8]>,
    /// Video and audio were fetched separately and muxed
    pub merged: bool,
    /// Requested audio bitrate that was missing and replaced by the best one
    pub fell_back_from: Option<String>,
}

impl DownloadOutput {
    pub fn extension(&self) -> &str {
        match (self.track, self.container.as_str()) {
            (TrackKind::Audio, "mp4") => "m4a",
            (_, container) => container,
        }
    }

    pub fn mime_type(&self) -> String {
        let major = if self.track == TrackKind::Audio { "audio" } else { "video" };
        format!("{}/{}", major, self.container)
    }

    /// "{title}_{quality}.{ext}" with unsafe characters replaced
    pub fn suggested_filename(&self) -> String {
        sanitize_filename(&format!("{}_{}.{}", self.title, self.quality, self.extension()))
    }
}

pub struct Downloader {
    provider: Arc<dyn CatalogProvider>,
    fetcher: Arc<dyn ResourceFetcher>,
    merger: MergeExecutor,
    retry: RetryPolicy,
}

impl Downloader {
    pub fn new(
        provider: Arc<dyn CatalogProvider>,
        fetcher: Arc<dyn ResourceFetcher>,
        config: &DownloaderConfig,
    ) -> Self {
        Self {
            merger: MergeExecutor::new(fetcher.clone(), config.muxer.clone(), config.temp_dir.clone()),
            provider,
            fetcher,
            retry: config.retry.clone(),
        }
    }

    /// yt-dlp for catalogs, reqwest for bytes
    pub fn from_config(config: &DownloaderConfig) -> Result<Self, DownloadError> {
        let provider = Arc::new(YtDlpCatalog::new(config.extractor.clone()));
        let fetcher = Arc::new(HttpFetcher::new(&config.network)?);
        Ok(Self::new(provider, fetcher, config))
    }

    pub async fn resolve(&self, url: &str) -> Result<StreamCatalog, DownloadError> {
        info!("[Downloader] Resolving {} with {}", url, self.provider.name());
        resolve_catalog(self.provider.as_ref(), url, &self.retry).await
    }

    /// Locator for an external download manager
    pub fn direct_link(
        &self,
        catalog: &StreamCatalog,
        request: &SelectionRequest,
    ) -> Result<String, DownloadError> {
        StreamSelector::direct_locator(catalog, request)?
            .map(str::to_string)
            .ok_or_else(|| DownloadError::NotFound {
                quality: request.quality.to_string(),
            })
    }

    pub async fn download(
        &self,
        catalog: &StreamCatalog,
        request: &SelectionRequest,
        mut observer: Option<&mut dyn ProgressObserver>,
    ) -> Result<DownloadOutput, DownloadError> {
        let selection = StreamSelector::select(catalog, request)?;

        let (bytes, container, merged, fell_back_from) = match selection {
            Selection::NotFound => {
                warn!(
                    "[Downloader] No {} stream for {} in {}",
                    request.track, request.quality, catalog.resource_id()
                );
                return Err(DownloadError::NotFound {
                    quality: request.quality.to_string(),
                });
            }
            Selection::Single(stream) => {
                let bytes = self.fetch_to_memory(stream, &mut observer).await?;
                (bytes, stream.container.clone(), false, None)
            }
            Selection::Audio {
                stream,
                fell_back_from,
            } => {
                if let Some(requested) = &fell_back_from {
                    Self::announce_fallback(requested, stream, &mut observer);
                }
                let bytes = self.fetch_to_memory(stream, &mut observer).await?;
                (bytes, stream.container.clone(), false, fell_back_from)
            }
            Selection::Pair { video, audio } => {
                info!(
                    "[Downloader] {} is not progressive, merging {} + {}",
                    request.quality, video.id, audio.id
                );
                let obs = observer.as_mut().map(|o| &mut **o as &mut dyn ProgressObserver);
                let bytes = self.merger.merge(video, audio, obs).await?;
                (bytes, video.container.clone(), true, None)
            }
        };

        Ok(DownloadOutput {
            resource_id: catalog.resource_id().to_string(),
            title: catalog.title().to_string(),
            quality: request.quality.to_string(),
            track: request.track,
            container,
            bytes: Arc::from(bytes),
            merged,
            fell_back_from,
        })
    }

    /// Like `download`, but reuses and fills a caller-owned cache
    pub async fn download_cached(
        &self,
        cache: &mut BufferCache,
        catalog: &StreamCatalog,
        request: &SelectionRequest,
        mut observer: Option<&mut dyn ProgressObserver>,
    ) -> Result<DownloadOutput, DownloadError> {
        let key = CacheKey::new(
            catalog.resource_id().to_string(),
            request.quality.to_string(),
            request.track,
        );

        if let Some(cached) = cache.get(&key) {
            info!("[Downloader] cache hit for {} {}", key.resource_id, key.quality);
            if let (Some(requested), Selection::Audio { stream, .. }) =
                (&cached.fell_back_from, StreamSelector::select(catalog, request)?)
            {
                Self::announce_fallback(requested, stream, &mut observer);
            }
            return Ok(cached);
        }

        let output = self.download(catalog, request, observer).await?;
        cache.insert(key, output.clone());
        Ok(output)
    }

    fn announce_fallback(
        requested: &str,
        substitute: &StreamDescriptor,
        observer: &mut Option<&mut dyn ProgressObserver>,
    ) {
        let notice = format!(
            "No audio stream found for {}. Falling back to {}.",
            requested,
            substitute.bitrate.as_deref().unwrap_or("the best available")
        );
        warn!("[Downloader] {}", notice);
        if let Some(obs) = observer.as_mut() {
            obs.on_notice(&notice);
        }
    }

    async fn fetch_to_memory(
        &self,
        stream: &StreamDescriptor,
        observer: &mut Option<&mut dyn ProgressObserver>,
    ) -> Result<Vec<u8>, DownloadError> {
        let mut sink = MemorySink::new();
        let obs = observer.as_mut().map(|o| &mut **o as &mut dyn ProgressObserver);
        self.fetcher.fetch(stream, &mut sink, obs).await?;
        Ok(sink.into_bytes())
    }
}
