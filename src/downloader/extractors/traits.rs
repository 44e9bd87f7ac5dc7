// CatalogProvider trait

use async_trait::async_trait;

use crate::downloader::errors::DownloadError;
use crate::downloader::models::StreamCatalog;

/// Turns a resource URL into the list of streams it offers
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Name of the provider (for logging)
    fn name(&self) -> &'static str;

    /// Check if this provider can run here
    fn is_available(&self) -> bool;

    /// Resolve one URL. Transient network trouble must come back as
    /// `DownloadError::Connectivity` so the caller can retry it.
    async fn resolve(&self, url: &str) -> Result<StreamCatalog, DownloadError>;
}
