// Catalog resolution with retry on transient connectivity failures
//
// Only `Connectivity` errors are retried. Anything else (bad URL, private
// video, missing binary) returns immediately.

use tracing::{info, warn};

use super::traits::CatalogProvider;
use crate::downloader::config::RetryPolicy;
use crate::downloader::errors::DownloadError;
use crate::downloader::models::StreamCatalog;

/// Resolve `url`, retrying per `policy`. After the last failed attempt the
/// result is `ConnectionExhausted` carrying the final underlying error.
pub async fn resolve_catalog(
    provider: &dyn CatalogProvider,
    url: &str,
    policy: &RetryPolicy,
) -> Result<StreamCatalog, DownloadError> {
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match provider.resolve(url).await {
            Ok(catalog) => {
                if attempt > 1 {
                    info!("[Catalog] {} succeeded on attempt {}", provider.name(), attempt);
                }
                return Ok(catalog);
            }
            Err(e) if e.is_transient() => {
                warn!(
                    "[Catalog] Connection error: {}, retrying {}/{} ...",
                    e, attempt, attempts
                );
                if attempt >= attempts {
                    return Err(DownloadError::ConnectionExhausted {
                        attempts,
                        last: Box::new(e),
                    });
                }
                tokio::time::sleep(policy.delay_after(attempt)).await;
                attempt += 1;
            }
            Err(e) => {
                warn!("[Catalog] {} failed: {}", provider.name(), e);
                return Err(e);
            }
        }
    }
}
