// Downloader module - stream selection, fetching and adaptive merge

pub mod cache;
pub mod config;
pub mod errors;
pub mod extractors;
pub mod fetcher;
pub mod format_selector;
pub mod merge;
pub mod models;
pub mod orchestrator;
pub mod tools;
pub mod traits;
pub mod utils;

pub use cache::{BufferCache, CacheKey};
pub use config::{DownloaderConfig, ExtractorConfig, MuxerConfig, NetworkConfig, RetryPolicy};
pub use errors::{DownloadError, FailureKind};
pub use extractors::{resolve_catalog, CatalogProvider, YtDlpCatalog};
pub use fetcher::{FileSink, HttpFetcher, MemorySink, PercentProgress, ProgressState};
pub use format_selector::{Selection, StreamSelector};
pub use merge::{MergeExecutor, MergeJob, MergeStage};
pub use models::{
    Quality, QualityLabel, SelectionRequest, StreamCatalog, StreamDescriptor, StreamKind, TrackKind,
};
pub use orchestrator::{DownloadOutput, Downloader};
pub use traits::{ByteSink, ProgressObserver, ResourceFetcher};
