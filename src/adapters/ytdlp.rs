//! yt-dlp CLI wrapper
//!
//! Runs the `yt-dlp` executable for metadata probing and downloads. Audio
//! extraction and video merging are delegated by yt-dlp to ffmpeg.

use crate::config::toml_config::MediaConfig;
use crate::core::format::sanitize_filename;
use crate::domain::model::{DownloadedMedia, MediaKind, VideoInfo};
use crate::domain::ports::MediaSource;
use crate::utils::error::{BotError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const DEFAULT_FFMPEG: &str = "ffmpeg";
const STDERR_TAIL_CHARS: usize = 500;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    id: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    view_count: Option<u64>,
    uploader: Option<String>,
    thumbnail: Option<String>,
}

/// Line printed by `--print after_move:...` once post-processing is done.
#[derive(Debug, Deserialize)]
struct FinishedDownload {
    title: Option<String>,
    duration: Option<f64>,
    filepath: Option<String>,
}

#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: String,
    ffmpeg_location: Option<String>,
    video_max_height: u32,
    audio_bitrate_kbps: u32,
    probe_timeout: Duration,
    socket_timeout: Duration,
    download_timeout: Duration,
}

impl YtDlp {
    pub fn new(media: &MediaConfig, download_timeout: Duration) -> Self {
        Self {
            binary: media.ytdlp_path.clone(),
            ffmpeg_location: (media.ffmpeg_path != DEFAULT_FFMPEG).then(|| media.ffmpeg_path.clone()),
            video_max_height: media.video_max_height,
            audio_bitrate_kbps: media.audio_bitrate_kbps,
            probe_timeout: Duration::from_secs(media.probe_timeout_seconds),
            socket_timeout: Duration::from_secs(media.socket_timeout_seconds),
            download_timeout,
        }
    }

    /// Hard cap on a metadata lookup, so a stuck extractor cannot hold the
    /// "Analizando" message forever.
    pub fn metadata_deadline(&self) -> Duration {
        self.probe_timeout.saturating_mul(3)
    }

    pub fn video_format(&self) -> String {
        let h = self.video_max_height;
        format!(
            "bestvideo[height<={h}][ext=mp4]+bestaudio[ext=m4a]/best[height<={h}][ext=mp4]/best",
            h = h
        )
    }

    fn download_args(&self, url: &str, kind: MediaKind, dest_dir: &Path) -> Vec<String> {
        let template = dest_dir.join("%(id)s.%(ext)s");
        let mut args: Vec<String> = vec![
            "--no-playlist".into(),
            "--restrict-filenames".into(),
            "--no-progress".into(),
            "--no-warnings".into(),
            "--socket-timeout".into(),
            self.socket_timeout.as_secs().to_string(),
            "-o".into(),
            template.to_string_lossy().into_owned(),
        ];

        if let Some(location) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".into());
            args.push(location.clone());
        }

        match kind {
            MediaKind::Video => {
                args.push("-f".into());
                args.push(self.video_format());
                args.push("--merge-output-format".into());
                args.push("mp4".into());
            }
            MediaKind::Audio => {
                args.push("-f".into());
                args.push("bestaudio[ext=m4a]/bestaudio/best".into());
                args.push("--extract-audio".into());
                args.push("--audio-format".into());
                args.push("mp3".into());
                args.push("--audio-quality".into());
                args.push(format!("{}K", self.audio_bitrate_kbps));
            }
        }

        args.push("--no-simulate".into());
        args.push("--print".into());
        args.push("after_move:%(.{id,title,duration,filepath})j".into());
        args.push("--".into());
        args.push(url.to_string());
        args
    }

    /// Run yt-dlp and return stdout
    async fn run(&self, args: &[String], limit: Duration, operation: &str) -> Result<String> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!("Running: {} {}", self.binary, args.join(" "));

        let output = match tokio::time::timeout(limit, cmd.output()).await {
            Err(_) => {
                return Err(BotError::Timeout {
                    operation: operation.to_string(),
                })
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BotError::ToolMissing {
                    tool: self.binary.clone(),
                })
            }
            Ok(result) => result?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BotError::DownloadFailed {
                message: summarize_stderr(&stderr),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Prefers the last `ERROR:` line; falls back to the tail of stderr.
fn summarize_stderr(stderr: &str) -> String {
    if let Some(line) = stderr.lines().rev().find(|l| l.trim_start().starts_with("ERROR:")) {
        return line.trim().to_string();
    }
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        return "yt-dlp exited with an error and no diagnostics".to_string();
    }
    let count = trimmed.chars().count();
    trimmed.chars().skip(count.saturating_sub(STDERR_TAIL_CHARS)).collect()
}

fn parse_probe(stdout: &str) -> Result<VideoInfo> {
    let raw: ProbeOutput = serde_json::from_str(stdout.trim())?;
    Ok(VideoInfo {
        id: raw.id,
        title: raw.title.unwrap_or_else(|| "Sin título".to_string()),
        duration: raw.duration.map(|d| d as i64).unwrap_or(0),
        views: raw.view_count.unwrap_or(0),
        uploader: raw.uploader.unwrap_or_else(|| "Desconocido".to_string()),
        thumbnail: raw.thumbnail.unwrap_or_default(),
    })
}

fn parse_finished(stdout: &str) -> Result<FinishedDownload> {
    let line = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| l.starts_with('{'))
        .ok_or_else(|| BotError::DownloadFailed {
            message: "yt-dlp did not report the downloaded file".to_string(),
        })?;
    Ok(serde_json::from_str(line)?)
}

/// Moves the file to `<dir>/<sanitized title>.<ext>`, replacing any previous
/// file there. A failed rename keeps the original path.
pub fn rename_to_title(path: &Path, title: &str) -> PathBuf {
    let Some(dir) = path.parent() else {
        return path.to_path_buf();
    };
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = if ext.is_empty() {
        title.to_string()
    } else {
        format!("{}.{}", title, ext)
    };
    let target = dir.join(file_name);

    if target == path {
        return target;
    }
    if target.exists() {
        if let Err(e) = std::fs::remove_file(&target) {
            tracing::warn!("Could not replace {}: {}", target.display(), e);
        }
    }
    match std::fs::rename(path, &target) {
        Ok(()) => target,
        Err(e) => {
            tracing::warn!("Error renaming {}: {}. Using original path.", path.display(), e);
            path.to_path_buf()
        }
    }
}

#[async_trait]
impl MediaSource for YtDlp {
    async fn probe(&self, url: &str) -> Result<VideoInfo> {
        let args: Vec<String> = vec![
            "--dump-single-json".into(),
            "--skip-download".into(),
            "--no-playlist".into(),
            "--no-warnings".into(),
            "--socket-timeout".into(),
            self.probe_timeout.as_secs().to_string(),
            "--".into(),
            url.to_string(),
        ];
        let stdout = self.run(&args, self.metadata_deadline(), "video probe").await?;
        parse_probe(&stdout)
    }

    async fn download(&self, url: &str, kind: MediaKind, dest_dir: &Path) -> Result<DownloadedMedia> {
        tokio::fs::create_dir_all(dest_dir).await?;

        let args = self.download_args(url, kind, dest_dir);
        let stdout = self.run(&args, self.download_timeout, "download").await?;
        let finished = parse_finished(&stdout)?;

        let reported = finished
            .filepath
            .map(PathBuf::from)
            .ok_or_else(|| BotError::DownloadFailed {
                message: "yt-dlp did not report the downloaded file".to_string(),
            })?;
        if !reported.exists() {
            return Err(BotError::DownloadFailed {
                message: format!("downloaded file is missing: {}", reported.display()),
            });
        }

        let title = sanitize_filename(finished.title.as_deref().unwrap_or("Sin título"));
        let path = rename_to_title(&reported, &title);

        tracing::info!("⬇️ Downloaded {} '{}' to {}", kind.as_str(), title, path.display());

        Ok(DownloadedMedia {
            path,
            title,
            duration: finished.duration.map(|d| d as i64).unwrap_or(0),
            kind,
        })
    }
}
