// Catalog providers
//
// A provider resolves a URL into a StreamCatalog. The yt-dlp provider does
// the site-specific work (signatures, manifests); this crate only parses
// its JSON and retries transient failures.

mod cli;
mod orchestrator;
mod traits;

pub use cli::YtDlpCatalog;
pub use orchestrator::resolve_catalog;
pub use traits::CatalogProvider;
