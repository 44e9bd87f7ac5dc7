use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ToolType {
    /// Media multiplexer used for adaptive merges
    Ffmpeg,
    /// Catalog provider
    YtDlp,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::Ffmpeg => "ffmpeg",
            ToolType::YtDlp => "yt-dlp",
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolType::Ffmpeg => "-version",
            ToolType::YtDlp => "--version",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<String>,
    pub is_available: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ToolManager {
    ffmpeg_program: Option<String>,
    ytdlp_program: Option<String>,
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use configured binaries instead of the default names
    pub fn with_programs(ffmpeg: impl Into<String>, ytdlp: impl Into<String>) -> Self {
        Self {
            ffmpeg_program: Some(ffmpeg.into()),
            ytdlp_program: Some(ytdlp.into()),
        }
    }

    /// Resolve a binary name or path to an executable, PATH first
    pub fn locate(program: &str) -> Option<PathBuf> {
        if let Ok(path) = which::which(program) {
            return Some(path);
        }

        // Desktop launches often miss the Homebrew prefix in PATH
        ["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"]
            .iter()
            .map(|dir| PathBuf::from(dir).join(program))
            .find(|candidate| candidate.is_file())
    }

    pub fn get_tool_info(&self, tool_type: ToolType) -> ToolInfo {
        let program = match tool_type {
            ToolType::Ffmpeg => self.ffmpeg_program.as_deref(),
            ToolType::YtDlp => self.ytdlp_program.as_deref(),
        }
        .unwrap_or(tool_type.as_str());

        let path = Self::locate(program);
        let version = path
            .as_ref()
            .and_then(|p| Self::get_version(p, &tool_type));

        ToolInfo {
            name: tool_type.as_str().to_string(),
            is_available: path.is_some(),
            path: path.map(|p| p.to_string_lossy().to_string()),
            version,
            tool_type,
        }
    }

    pub fn get_all_tools(&self) -> Vec<ToolInfo> {
        vec![
            self.get_tool_info(ToolType::Ffmpeg),
            self.get_tool_info(ToolType::YtDlp),
        ]
    }

    fn get_version(path: &Path, tool_type: &ToolType) -> Option<String> {
        match Command::new(path).arg(tool_type.version_arg()).output() {
            Ok(output) if output.status.success() => {
                // ffmpeg prints a banner; the first line carries the version
                String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .next()
                    .map(|line| line.trim().to_string())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tool() {
        let manager = ToolManager::with_programs("no-such-muxer-7c1e", "no-such-extractor-7c1e");
        let info = manager.get_tool_info(ToolType::Ffmpeg);
        assert!(!info.is_available);
        assert!(info.path.is_none());
        assert!(info.version.is_none());
        assert_eq!(info.name, "ffmpeg");
    }

    #[cfg(unix)]
    #[test]
    fn test_locate_on_path() {
        assert!(ToolManager::locate("sh").is_some());
        assert!(ToolManager::locate("no-such-binary-7c1e").is_none());
    }
}
