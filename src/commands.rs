//! CLI command implementations

use std::path::{Path, PathBuf};

use clap::Subcommand;
use tracing::info;
use tube_fetch::downloader::tools::ToolManager;
use tube_fetch::downloader::utils::{classify_locator, LocatorKind};
use tube_fetch::downloader::{PercentProgress, StreamSelector};
use tube_fetch::{DownloadError, Downloader, DownloaderConfig, SelectionRequest, StreamCatalog};

#[derive(Subcommand)]
pub enum Commands {
    /// List the qualities available for a video
    Formats {
        url: String,
        /// Print the raw stream catalog as JSON
        #[arg(long)]
        json: bool,
    },
    /// Download a video (or its audio track) into a file
    Download {
        url: String,
        /// Resolution ("720p"), bitrate ("128kbps") or "highest"
        #[arg(short, long, default_value = "highest")]
        quality: String,
        /// Audio track only
        #[arg(long)]
        audio: bool,
        /// Output directory (overrides the config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the direct stream URL for an external download manager
    Link {
        url: String,
        #[arg(short, long, default_value = "highest")]
        quality: String,
        #[arg(long)]
        audio: bool,
    },
    /// Show whether ffmpeg and yt-dlp are installed
    Tools,
}

pub async fn handle_command(config: Option<PathBuf>, command: Commands) -> Result<(), DownloadError> {
    let config = match config {
        Some(path) => DownloaderConfig::load(&path)?,
        None => DownloaderConfig::default(),
    };

    match command {
        Commands::Formats { url, json } => list_formats(&config, &url, json).await,
        Commands::Download {
            url,
            quality,
            audio,
            output,
        } => {
            let dir = output.unwrap_or_else(|| config.output_dir.clone());
            download(&config, &url, &request(&quality, audio), &dir).await
        }
        Commands::Link { url, quality, audio } => {
            print_link(&config, &url, &request(&quality, audio)).await
        }
        Commands::Tools => {
            show_tools(&config);
            Ok(())
        }
    }
}

fn request(quality: &str, audio: bool) -> SelectionRequest {
    if audio {
        SelectionRequest::audio(quality)
    } else {
        SelectionRequest::video(quality)
    }
}

async fn resolve(downloader: &Downloader, url: &str) -> Result<StreamCatalog, DownloadError> {
    if classify_locator(url) == LocatorKind::Playlist {
        return Err(DownloadError::Resolution(
            "Playlists are not supported, pass a single video URL".to_string(),
        ));
    }
    downloader.resolve(url).await
}

async fn list_formats(config: &DownloaderConfig, url: &str, json: bool) -> Result<(), DownloadError> {
    let downloader = Downloader::from_config(config)?;
    let catalog = resolve(&downloader, url).await?;

    if json {
        let out = serde_json::to_string_pretty(&catalog)
            .map_err(|e| DownloadError::ParseError(e.to_string()))?;
        println!("{out}");
        return Ok(());
    }

    println!("{}", catalog.title());
    println!("  video: {}", StreamSelector::video_qualities(&catalog, "mp4").join(", "));
    println!("  audio: {}", StreamSelector::audio_qualities(&catalog, "mp4").join(", "));
    Ok(())
}

async fn download(
    config: &DownloaderConfig,
    url: &str,
    request: &SelectionRequest,
    dir: &Path,
) -> Result<(), DownloadError> {
    let downloader = Downloader::from_config(config)?;
    let catalog = resolve(&downloader, url).await?;

    let mut progress = PercentProgress::new(|percent| {
        if percent % 10 == 0 {
            info!("{percent}%");
        }
    });
    let output = downloader.download(&catalog, request, Some(&mut progress)).await?;

    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(output.suggested_filename());
    tokio::fs::write(&path, &output.bytes[..]).await?;

    println!("Saved {} ({} bytes)", path.display(), output.bytes.len());
    Ok(())
}

async fn print_link(
    config: &DownloaderConfig,
    url: &str,
    request: &SelectionRequest,
) -> Result<(), DownloadError> {
    let downloader = Downloader::from_config(config)?;
    let catalog = resolve(&downloader, url).await?;
    println!("{}", downloader.direct_link(&catalog, request)?);
    Ok(())
}

fn show_tools(config: &DownloaderConfig) {
    let manager = ToolManager::with_programs(&config.muxer.program, &config.extractor.program);
    for tool in manager.get_all_tools() {
        match (tool.is_available, tool.version) {
            (true, Some(version)) => println!("✓ {}: {}", tool.name, version),
            (true, None) => println!("✓ {}: {}", tool.name, tool.path.unwrap_or_default()),
            (false, _) => println!("✗ {}: not found", tool.name),
        }
    }
}
