//! Stream selection, download and ffmpeg merge for video-site extractors.
//!
//! A catalog provider (yt-dlp) lists the streams of a video; the
//! [`Downloader`] picks one or an adaptive video/audio pair, fetches the
//! bytes over HTTP and muxes pairs into a single file.

pub mod downloader;

pub use downloader::{
    DownloadError, DownloadOutput, Downloader, DownloaderConfig, Quality, SelectionRequest,
    StreamCatalog, TrackKind,
};
