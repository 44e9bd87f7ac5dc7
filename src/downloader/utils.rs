// Helper functions shared by the extractor and the merge step

use lazy_static::lazy_static;
use regex::Regex;
use std::ffi::OsStr;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::{timeout, Duration as TokioDuration};

lazy_static! {
    static ref UNSAFE_FILENAME_CHARS: Regex = Regex::new(r#"[<>:"/\\|?*]"#).unwrap();
}

/// Why a subprocess run did not produce output
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {secs}s")]
    TimedOut { program: String, secs: u64 },

    #[error("{0}")]
    Io(String),
}

/// Run command with timeout; the child is killed when the limit is hit
pub async fn run_output_with_timeout<I, S>(
    program: &str,
    args: I,
    timeout_secs: u64,
) -> Result<std::process::Output, RunError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut child = TokioCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| RunError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| RunError::Io(format!("Failed to capture stdout from {}", program)))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| RunError::Io(format!("Failed to capture stderr from {}", program)))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    let waited = timeout(TokioDuration::from_secs(timeout_secs), child.wait()).await;
    match waited {
        Ok(status_res) => {
            let status = status_res
                .map_err(|e| RunError::Io(format!("Failed to wait for {}: {}", program, e)))?;
            let stdout = stdout_task
                .await
                .map_err(|e| RunError::Io(format!("stdout task failed: {}", e)))?
                .map_err(|e| RunError::Io(format!("Failed to read stdout: {}", e)))?;
            let stderr = stderr_task
                .await
                .map_err(|e| RunError::Io(format!("stderr task failed: {}", e)))?
                .map_err(|e| RunError::Io(format!("Failed to read stderr: {}", e)))?;
            Ok(std::process::Output { status, stdout, stderr })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(RunError::TimedOut {
                program: program.to_string(),
                secs: timeout_secs,
            })
        }
    }
}

/// Replace characters Windows refuses in file names with '_'
pub fn sanitize_filename(name: &str) -> String {
    UNSAFE_FILENAME_CHARS.replace_all(name, "_").into_owned()
}

/// Kind of resource a locator points to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorKind {
    Video,
    Playlist,
}

/// Quick check for playlist URLs ('list=' param or '/playlist' path)
pub fn classify_locator(url: &str) -> LocatorKind {
    if url.contains("list=") || url.contains("/playlist") {
        LocatorKind::Playlist
    } else {
        LocatorKind::Video
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(
            sanitize_filename(r#"AC/DC: "Live" <1991> | part 1?*\"#),
            "AC_DC_ _Live_ _1991_ _ part 1___"
        );
        assert_eq!(sanitize_filename("plain name_720p.mp4"), "plain name_720p.mp4");
    }

    #[test]
    fn test_classify_locator() {
        assert_eq!(
            classify_locator("https://www.youtube.com/watch?v=abc&list=PL123"),
            LocatorKind::Playlist
        );
        assert_eq!(
            classify_locator("https://www.youtube.com/playlist?list=PL123"),
            LocatorKind::Playlist
        );
        assert_eq!(
            classify_locator("https://youtu.be/dQw4w9WgXcQ"),
            LocatorKind::Video
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_output_captures_streams() {
        let out = run_output_with_timeout("sh", ["-c", "echo out; echo err >&2; exit 3"], 10)
            .await
            .unwrap();
        assert_eq!(out.status.code(), Some(3));
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "out");
        assert_eq!(String::from_utf8_lossy(&out.stderr).trim(), "err");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_output_times_out() {
        let err = run_output_with_timeout("sh", ["-c", "sleep 5"], 1).await.unwrap_err();
        assert!(matches!(err, RunError::TimedOut { secs: 1, .. }));
    }

    #[tokio::test]
    async fn test_run_output_missing_program() {
        let err = run_output_with_timeout("definitely-not-a-program-4f2a", Vec::<String>::new(), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Spawn { .. }));
    }
}
