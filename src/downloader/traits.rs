// Seams between the downloader core and its collaborators

use async_trait::async_trait;

use super::errors::DownloadError;
use super::models::StreamDescriptor;

/// Destination for fetched bytes (memory buffer or file)
#[async_trait]
pub trait ByteSink: Send {
    async fn write_chunk(&mut self, chunk: &[u8]) -> std::io::Result<()>;

    /// Flush anything buffered; called once after the last chunk
    async fn finish(&mut self) -> std::io::Result<()>;
}

/// Progress observer invoked synchronously on the fetching task
pub trait ProgressObserver: Send {
    /// A new fetch is starting
    fn on_start(&mut self) {}

    /// `done` bytes received out of `total` (never called with `total == 0`)
    fn on_progress(&mut self, done: u64, total: u64);

    /// Something the user should know about (e.g., a quality substitution)
    fn on_notice(&mut self, _message: &str) {}
}

/// Moves one stream's bytes into a sink
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Name of the fetcher (for logging)
    fn name(&self) -> &'static str;

    /// Fetch the stream, returning the number of bytes written
    async fn fetch(
        &self,
        stream: &StreamDescriptor,
        sink: &mut dyn ByteSink,
        observer: Option<&mut dyn ProgressObserver>,
    ) -> Result<u64, DownloadError>;
}
