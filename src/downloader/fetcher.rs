// HTTP resource fetcher and byte sinks
//
// A transfer that fails midway is not retried here; it surfaces as
// TransferFailed and the caller restarts the whole operation.

use async_trait::async_trait;
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use super::config::NetworkConfig;
use super::errors::DownloadError;
use super::models::StreamDescriptor;
use super::traits::{ByteSink, ProgressObserver, ResourceFetcher};

/// In-memory sink
#[derive(Debug, Default)]
pub struct MemorySink {
    buffer: Vec<u8>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[async_trait]
impl ByteSink for MemorySink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> std::io::Result<()> {
        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    async fn finish(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// File sink; the file is created (or truncated) on construction
pub struct FileSink {
    path: PathBuf,
    writer: BufWriter<tokio::fs::File>,
}

impl FileSink {
    pub async fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = tokio::fs::File::create(&path).await?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ByteSink for FileSink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> std::io::Result<()> {
        self.writer.write_all(chunk).await
    }

    async fn finish(&mut self) -> std::io::Result<()> {
        self.writer.flush().await
    }
}

/// Last reported percent for one fetch. Non-decreasing until reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressState {
    last_percent: u8,
}

impl ProgressState {
    pub fn last_percent(&self) -> u8 {
        self.last_percent
    }

    pub fn reset(&mut self) {
        self.last_percent = 0;
    }

    /// Returns the new percent only when it went up
    pub fn advance(&mut self, done: u64, total: u64) -> Option<u8> {
        if total == 0 {
            return None;
        }
        let percent = ((done.min(total) as u128 * 100) / total as u128) as u8;
        if percent > self.last_percent {
            self.last_percent = percent;
            Some(percent)
        } else {
            None
        }
    }
}

/// Observer that forwards only whole-percent increases
pub struct PercentProgress<F>
where
    F: FnMut(u8) + Send,
{
    state: ProgressState,
    on_percent: F,
}

impl<F> PercentProgress<F>
where
    F: FnMut(u8) + Send,
{
    pub fn new(on_percent: F) -> Self {
        Self {
            state: ProgressState::default(),
            on_percent,
        }
    }

    pub fn state(&self) -> ProgressState {
        self.state
    }
}

impl<F> ProgressObserver for PercentProgress<F>
where
    F: FnMut(u8) + Send,
{
    fn on_start(&mut self) {
        self.state.reset();
    }

    fn on_progress(&mut self, done: u64, total: u64) {
        if let Some(percent) = self.state.advance(done, total) {
            (self.on_percent)(percent);
        }
    }

    fn on_notice(&mut self, message: &str) {
        info!("{}", message);
    }
}

/// reqwest-backed fetcher
pub struct HttpFetcher {
    client: reqwest::Client,
    range_chunk_size: Option<u64>,
}

impl HttpFetcher {
    pub fn new(config: &NetworkConfig) -> Result<Self, DownloadError> {
        let mut builder = reqwest::Client::builder();

        if let Some(secs) = config.timeout_secs {
            // Connection setup only; a whole-request timeout would cut off long streams
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }

        if let Some(proxy_url) = config.proxy.as_deref() {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| DownloadError::ParseError(format!("Invalid proxy URL {}: {}", proxy_url, e)))?;
            builder = builder.proxy(proxy);
        } else if !config.system_proxy {
            builder = builder.no_proxy();
        }

        let client = builder
            .build()
            .map_err(|e| DownloadError::Io(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            range_chunk_size: config.range_chunk_size.filter(|size| *size > 0),
        })
    }

    fn transfer_error(stream: &StreamDescriptor, reason: impl ToString) -> DownloadError {
        DownloadError::TransferFailed {
            stream_id: stream.id.clone(),
            reason: reason.to_string(),
        }
    }

    async fn send(
        &self,
        stream: &StreamDescriptor,
        range: Option<(u64, u64)>,
    ) -> Result<reqwest::Response, DownloadError> {
        let mut request = self.client.get(&stream.locator);
        if let Some((start, end)) = range {
            request = request.header(RANGE, format!("bytes={}-{}", start, end));
        }

        request
            .send()
            .await
            .map_err(|e| Self::transfer_error(stream, e))
    }

    /// Full length from `Content-Range: bytes a-b/N`
    fn range_total(response: &reqwest::Response) -> Option<u64> {
        response
            .headers()
            .get(CONTENT_RANGE)?
            .to_str()
            .ok()?
            .rsplit_once('/')?
            .1
            .trim()
            .parse()
            .ok()
    }

    /// Fetch in `chunk_size` ranges. `estimate` only drives progress until
    /// the server reports the real length.
    async fn fetch_ranged(
        &self,
        stream: &StreamDescriptor,
        sink: &mut dyn ByteSink,
        observer: &mut Option<&mut dyn ProgressObserver>,
        chunk_size: u64,
        estimate: u64,
    ) -> Result<u64, DownloadError> {
        let mut written = 0u64;
        let mut total: Option<u64> = None;

        loop {
            let mut end = written + chunk_size - 1;
            if let Some(total) = total {
                end = end.min(total - 1);
            }
            let response = self.send(stream, Some((written, end))).await?;

            match response.status() {
                StatusCode::PARTIAL_CONTENT => {}
                // Server ignored the range and sent the whole body
                StatusCode::OK if written == 0 => {
                    let total = response.content_length().unwrap_or(estimate);
                    Self::pump(stream, response, sink, observer, &mut written, total).await?;
                    return Ok(written);
                }
                StatusCode::OK => {
                    return Err(Self::transfer_error(stream, "server does not support range requests"));
                }
                // Past the end of a body whose length was never announced
                StatusCode::RANGE_NOT_SATISFIABLE if total.is_none() && written > 0 => break,
                status => {
                    return Err(Self::transfer_error(stream, format!("HTTP {} for range {}-{}", status, written, end)));
                }
            }

            if total.is_none() {
                total = Self::range_total(&response);
                if let Some(total) = total {
                    debug!("[HttpFetcher] stream {} is {} bytes (estimated {})", stream.id, total, estimate);
                }
            }

            let before = written;
            Self::pump(stream, response, sink, observer, &mut written, total.unwrap_or(estimate)).await?;
            let received = written - before;

            match total {
                Some(total) if written >= total => break,
                _ if received == 0 => break,
                None if received < chunk_size => break,
                _ => {}
            }
        }

        match total {
            Some(total) if written != total => Err(Self::transfer_error(
                stream,
                format!("received {} of {} bytes", written, total),
            )),
            _ => Ok(written),
        }
    }

    /// Drain one response body into the sink
    async fn pump(
        stream: &StreamDescriptor,
        mut response: reqwest::Response,
        sink: &mut dyn ByteSink,
        observer: &mut Option<&mut dyn ProgressObserver>,
        written: &mut u64,
        total: u64,
    ) -> Result<(), DownloadError> {
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Self::transfer_error(stream, e))?
        {
            sink.write_chunk(&chunk)
                .await
                .map_err(|e| Self::transfer_error(stream, e))?;
            *written += chunk.len() as u64;

            if total > 0 {
                if let Some(obs) = observer.as_mut() {
                    obs.on_progress(*written, total);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(
        &self,
        stream: &StreamDescriptor,
        sink: &mut dyn ByteSink,
        mut observer: Option<&mut dyn ProgressObserver>,
    ) -> Result<u64, DownloadError> {
        if let Some(obs) = observer.as_mut() {
            obs.on_start();
        }

        let known_size = stream.size.filter(|size| *size > 0);

        let written = match (known_size, self.range_chunk_size) {
            (Some(estimate), Some(chunk_size)) => {
                debug!(
                    "[HttpFetcher] ~{} bytes for stream {} in {}-byte ranges",
                    estimate, stream.id, chunk_size
                );
                self.fetch_ranged(stream, sink, &mut observer, chunk_size, estimate)
                    .await?
            }
            _ => {
                let response = self
                    .send(stream, None)
                    .await?
                    .error_for_status()
                    .map_err(|e| Self::transfer_error(stream, e))?;
                let total = response.content_length().or(known_size).unwrap_or(0);
                debug!("[HttpFetcher] stream {} ({} bytes announced)", stream.id, total);
                let mut written = 0u64;
                Self::pump(stream, response, sink, &mut observer, &mut written, total).await?;
                written
            }
        };

        sink.finish()
            .await
            .map_err(|e| Self::transfer_error(stream, e))?;

        info!("[HttpFetcher] ✓ stream {}: {} bytes", stream.id, written);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::models::StreamKind;
    use std::sync::{Arc, Mutex};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Serve `body` over HTTP, honouring single `Range: bytes=a-b` headers
    /// when `ranges` is set. Sends no Content-Length when `announce` is false.
    async fn serve(body: Vec<u8>, ranges: bool, announce: bool) -> String {
        let len = body.len();
        serve_declaring(body, ranges, announce, len).await
    }

    /// Like `serve`, but Content-Range reports `declared` as the full length
    async fn serve_declaring(body: Vec<u8>, ranges: bool, announce: bool, declared: usize) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let body = body.clone();
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        let n = socket.read(&mut buf).await.unwrap_or(0);
                        if n == 0 {
                            return;
                        }
                        request.extend_from_slice(&buf[..n]);
                    }
                    let request = String::from_utf8_lossy(&request).to_lowercase();
                    let range = request
                        .lines()
                        .find_map(|l| l.strip_prefix("range: bytes="))
                        .and_then(|r| {
                            let (a, b) = r.trim().split_once('-')?;
                            Some((a.parse::<usize>().ok()?, b.parse::<usize>().ok()?))
                        });

                    let (status, content_range, slice) = match range {
                        Some((a, _)) if ranges && a >= body.len() => (
                            "416 Range Not Satisfiable",
                            format!("Content-Range: bytes */{}\r\n", declared),
                            Vec::new(),
                        ),
                        Some((a, b)) if ranges => {
                            let b = b.min(body.len() - 1);
                            (
                                "206 Partial Content",
                                format!("Content-Range: bytes {}-{}/{}\r\n", a, b, declared),
                                body[a..=b].to_vec(),
                            )
                        }
                        _ => ("200 OK", String::new(), body.clone()),
                    };
                    let head = if announce {
                        format!(
                            "HTTP/1.1 {}\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n",
                            status,
                            content_range,
                            slice.len()
                        )
                    } else {
                        format!("HTTP/1.1 {}\r\n{}Connection: close\r\n\r\n", status, content_range)
                    };
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.write_all(&slice).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        format!("http://{}/media", addr)
    }

    fn local_network() -> NetworkConfig {
        NetworkConfig {
            system_proxy: false,
            ..NetworkConfig::default()
        }
    }

    fn descriptor(locator: String, size: Option<u64>) -> StreamDescriptor {
        StreamDescriptor {
            id: "18".to_string(),
            container: "mp4".to_string(),
            kind: StreamKind::Progressive,
            resolution: Some("360p".to_string()),
            bitrate: None,
            size,
            locator,
        }
    }

    fn recording_observer() -> (PercentProgress<impl FnMut(u8) + Send>, Arc<Mutex<Vec<u8>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let observer = PercentProgress::new(move |p| sink.lock().unwrap().push(p));
        (observer, seen)
    }

    #[test]
    fn test_progress_state_is_monotonic() {
        let mut state = ProgressState::default();
        assert_eq!(state.advance(10, 100), Some(10));
        assert_eq!(state.advance(10, 100), None);
        assert_eq!(state.advance(5, 100), None);
        assert_eq!(state.last_percent(), 10);
        assert_eq!(state.advance(250, 100), Some(100));

        state.reset();
        assert_eq!(state.last_percent(), 0);
        assert_eq!(state.advance(0, 0), None);
    }

    #[tokio::test]
    async fn test_ranged_fetch_into_memory() {
        let body: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let url = serve(body.clone(), true, true).await;
        let fetcher = HttpFetcher::new(&NetworkConfig {
            range_chunk_size: Some(3_000),
            ..local_network()
        })
        .unwrap();

        let (mut observer, seen) = recording_observer();
        let mut sink = MemorySink::new();
        let written = fetcher
            .fetch(&descriptor(url, Some(body.len() as u64)), &mut sink, Some(&mut observer))
            .await
            .unwrap();

        assert_eq!(written, body.len() as u64);
        assert_eq!(sink.into_bytes(), body);

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_ranged_fetch_follows_real_length() {
        let body: Vec<u8> = (0..10_000u32).map(|i| (i % 253) as u8).collect();
        let url = serve(body.clone(), true, true).await;
        let fetcher = HttpFetcher::new(&NetworkConfig {
            range_chunk_size: Some(3_000),
            ..local_network()
        })
        .unwrap();

        // Approximate sizes on either side of the real one
        for estimate in [8_000, 14_000] {
            let (mut observer, seen) = recording_observer();
            let mut sink = MemorySink::new();
            let written = fetcher
                .fetch(&descriptor(url.clone(), Some(estimate)), &mut sink, Some(&mut observer))
                .await
                .unwrap();

            assert_eq!(written, 10_000);
            assert_eq!(sink.into_bytes(), body);
            assert_eq!(seen.lock().unwrap().last(), Some(&100));
        }
    }

    #[tokio::test]
    async fn test_short_ranged_body_is_transfer_failure() {
        let body = vec![3u8; 10_000];
        let url = serve_declaring(body, true, true, 12_000).await;
        let fetcher = HttpFetcher::new(&NetworkConfig {
            range_chunk_size: Some(3_000),
            ..local_network()
        })
        .unwrap();

        let mut sink = MemorySink::new();
        let err = fetcher
            .fetch(&descriptor(url, Some(12_000)), &mut sink, None)
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::TransferFailed { ref stream_id, .. } if stream_id == "18"));
    }

    #[tokio::test]
    async fn test_server_without_range_support() {
        let body = vec![7u8; 5_000];
        let url = serve(body.clone(), false, true).await;
        let fetcher = HttpFetcher::new(&NetworkConfig {
            range_chunk_size: Some(1_000),
            ..local_network()
        })
        .unwrap();

        let mut sink = MemorySink::new();
        let written = fetcher
            .fetch(&descriptor(url, Some(5_000)), &mut sink, None)
            .await
            .unwrap();

        assert_eq!(written, 5_000);
        assert_eq!(sink.len(), 5_000);
    }

    #[tokio::test]
    async fn test_unknown_size_skips_progress() {
        let body = vec![1u8; 4_096];
        let url = serve(body.clone(), false, false).await;
        let fetcher = HttpFetcher::new(&local_network()).unwrap();

        let (mut observer, seen) = recording_observer();
        let mut sink = MemorySink::new();
        let written = fetcher
            .fetch(&descriptor(url, None), &mut sink, Some(&mut observer))
            .await
            .unwrap();

        assert_eq!(written, 4_096);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(observer.state().last_percent(), 0);
    }

    #[tokio::test]
    async fn test_file_sink() {
        let body = b"ftypisom-and-some-more-bytes".to_vec();
        let url = serve(body.clone(), false, true).await;
        let fetcher = HttpFetcher::new(&local_network()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");

        let mut sink = FileSink::create(&path).await.unwrap();
        fetcher.fetch(&descriptor(url, None), &mut sink, None).await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), body);
    }

    #[tokio::test]
    async fn test_unreachable_locator_is_transfer_failed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = HttpFetcher::new(&local_network()).unwrap();
        let mut sink = MemorySink::new();
        let err = fetcher
            .fetch(&descriptor(format!("http://{}/gone", addr), None), &mut sink, None)
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::TransferFailed { ref stream_id, .. } if stream_id == "18"));
    }
}
