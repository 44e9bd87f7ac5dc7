// Adaptive merge: fetch video and audio tracks to temp files, mux with ffmpeg
//
// Idle -> FetchingVideo -> FetchingAudio -> Merging -> Done | Failed
//
// Every exit path goes through MergeJob's cleanup, which removes whatever
// temp files were created. Removal failures are logged, never returned.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::MuxerConfig;
use super::errors::DownloadError;
use super::fetcher::FileSink;
use super::models::StreamDescriptor;
use super::tools::ToolManager;
use super::traits::{ProgressObserver, ResourceFetcher};
use super::utils::{run_output_with_timeout, RunError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStage {
    Idle,
    FetchingVideo,
    FetchingAudio,
    Merging,
    Done,
    Failed,
}

impl fmt::Display for MergeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::FetchingVideo => "fetching video",
            Self::FetchingAudio => "fetching audio",
            Self::Merging => "merging",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Temp paths for one adaptive download. Names carry a fresh UUID so
/// concurrent merges in the same directory never collide.
#[derive(Debug)]
pub struct MergeJob {
    video_path: PathBuf,
    audio_path: PathBuf,
    output_path: PathBuf,
    cleaned: bool,
}

impl MergeJob {
    pub fn new(temp_dir: &Path, container: &str) -> Self {
        let token = || Uuid::new_v4().simple().to_string();
        Self {
            video_path: temp_dir.join(format!("temp_video_{}.{}", token(), container)),
            audio_path: temp_dir.join(format!("temp_audio_{}.{}", token(), container)),
            output_path: temp_dir.join(format!("merged_{}.{}", token(), container)),
            cleaned: false,
        }
    }

    pub fn video_path(&self) -> &Path {
        &self.video_path
    }

    pub fn audio_path(&self) -> &Path {
        &self.audio_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn paths(&self) -> [&Path; 3] {
        [&self.video_path, &self.audio_path, &self.output_path]
    }

    /// Remove every path that exists. Idempotent.
    pub async fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;

        for path in [&self.video_path, &self.audio_path, &self.output_path] {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                continue;
            }
            Self::log_removal(path, tokio::fs::remove_file(path).await);
        }
    }

    /// Blocking variant for `Drop`, when the async path never ran
    fn cleanup_blocking(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;

        for path in [&self.video_path, &self.audio_path, &self.output_path] {
            if path.exists() {
                Self::log_removal(path, std::fs::remove_file(path));
            }
        }
    }

    fn log_removal(path: &Path, result: std::io::Result<()>) {
        match result {
            Ok(()) => debug!("[Merge] removed {}", path.display()),
            Err(e) => warn!("[Merge] Failed to remove temp file {}: {}", path.display(), e),
        }
    }
}

impl Drop for MergeJob {
    fn drop(&mut self) {
        self.cleanup_blocking();
    }
}

/// Runs the adaptive merge pipeline
pub struct MergeExecutor {
    fetcher: Arc<dyn ResourceFetcher>,
    muxer: MuxerConfig,
    temp_dir: PathBuf,
}

impl MergeExecutor {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>, muxer: MuxerConfig, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            muxer,
            temp_dir: temp_dir.into(),
        }
    }

    /// Fail fast when the muxer is not installed
    pub fn preflight(&self) -> Result<PathBuf, DownloadError> {
        ToolManager::locate(&self.muxer.program).ok_or_else(|| {
            DownloadError::ToolUnavailable(format!(
                "{} is not installed or not on PATH",
                self.muxer.program
            ))
        })
    }

    /// Fetch both tracks and mux them into one file, returning its bytes.
    /// Tracks are fetched one after the other.
    pub async fn merge(
        &self,
        video: &StreamDescriptor,
        audio: &StreamDescriptor,
        mut observer: Option<&mut dyn ProgressObserver>,
    ) -> Result<Vec<u8>, DownloadError> {
        let muxer = self.preflight()?;

        let mut job = MergeJob::new(&self.temp_dir, &video.container);
        let mut stage = MergeStage::Idle;

        let result = self
            .run(&muxer, &job, &mut stage, video, audio, &mut observer)
            .await;

        match &result {
            Ok(bytes) => {
                stage = MergeStage::Done;
                info!("[Merge] ✓ {} + {} merged ({} bytes)", video.id, audio.id, bytes.len());
            }
            Err(e) => {
                warn!("[Merge] ✗ failed while {}: {}", stage, e);
                stage = MergeStage::Failed;
            }
        }
        debug!("[Merge] stage: {}", stage);

        job.cleanup().await;
        result
    }

    async fn run(
        &self,
        muxer: &Path,
        job: &MergeJob,
        stage: &mut MergeStage,
        video: &StreamDescriptor,
        audio: &StreamDescriptor,
        observer: &mut Option<&mut dyn ProgressObserver>,
    ) -> Result<Vec<u8>, DownloadError> {
        *stage = MergeStage::FetchingVideo;
        debug!("[Merge] stage: {} ({})", stage, video.id);
        if let Some(obs) = observer.as_mut() {
            obs.on_notice("Downloading video track...");
        }
        self.fetch_to(video, job.video_path(), observer).await?;

        *stage = MergeStage::FetchingAudio;
        debug!("[Merge] stage: {} ({})", stage, audio.id);
        if let Some(obs) = observer.as_mut() {
            obs.on_notice("Downloading audio track...");
        }
        self.fetch_to(audio, job.audio_path(), observer).await?;

        *stage = MergeStage::Merging;
        debug!("[Merge] stage: {}", stage);
        if let Some(obs) = observer.as_mut() {
            obs.on_notice("Merging files with ffmpeg...");
        }
        self.mux(muxer, job).await?;

        tokio::fs::read(job.output_path()).await.map_err(|e| {
            DownloadError::merge_failed(format!("merged output unreadable: {}", e), "")
        })
    }

    async fn fetch_to(
        &self,
        stream: &StreamDescriptor,
        path: &Path,
        observer: &mut Option<&mut dyn ProgressObserver>,
    ) -> Result<u64, DownloadError> {
        let mut sink = FileSink::create(path)
            .await
            .map_err(|e| DownloadError::Io(format!("{}: {}", path.display(), e)))?;

        // Reborrow so the observer survives for the next track
        let obs = observer.as_mut().map(|o| &mut **o as &mut dyn ProgressObserver);
        self.fetcher.fetch(stream, &mut sink, obs).await
    }

    async fn mux(&self, muxer: &Path, job: &MergeJob) -> Result<(), DownloadError> {
        // Overwrite, two inputs, copy codecs without re-encoding
        let args: [&OsStr; 8] = [
            OsStr::new("-y"),
            OsStr::new("-i"),
            job.video_path().as_os_str(),
            OsStr::new("-i"),
            job.audio_path().as_os_str(),
            OsStr::new("-c"),
            OsStr::new("copy"),
            job.output_path().as_os_str(),
        ];
        let program = muxer.to_string_lossy();

        let output = run_output_with_timeout(&program, args, self.muxer.timeout_secs)
            .await
            .map_err(|e| match e {
                RunError::TimedOut { secs, .. } => {
                    DownloadError::merge_failed(format!("ffmpeg did not finish within {}s", secs), "")
                }
                other => DownloadError::merge_failed(other.to_string(), ""),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("[Merge] ffmpeg failed ({}): {}", output.status, stderr.trim());
            return Err(DownloadError::merge_failed(
                format!("ffmpeg exited with {}", output.status),
                &stderr,
            ));
        }

        if !job.output_path().is_file() {
            return Err(DownloadError::merge_failed("ffmpeg produced no output file", ""));
        }

        Ok(())
    }
}
