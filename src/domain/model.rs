use crate::domain::link::{canonical_watch_url, extract_video_id, is_video_id};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Telegram caps `callback_data` at 64 bytes.
pub const MAX_CALLBACK_DATA_BYTES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            MediaKind::Video => "mp4",
            MediaKind::Audio => "mp3",
        }
    }
}

/// Metadata shown before the user picks a format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub id: Option<String>,
    pub title: String,
    pub duration: i64,
    pub views: u64,
    pub uploader: String,
    pub thumbnail: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedMedia {
    pub path: PathBuf,
    pub title: String,
    pub duration: i64,
    pub kind: MediaKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Start,
    About,
    Terms,
    HelpStart,
    Cancel,
    Download { kind: MediaKind, url: String },
    Invalid,
}

impl CallbackAction {
    pub fn parse(data: &str) -> Self {
        match data {
            "start" => CallbackAction::Start,
            "about" => CallbackAction::About,
            "terms" => CallbackAction::Terms,
            "help_start" => CallbackAction::HelpStart,
            "cancel" => CallbackAction::Cancel,
            other => {
                let Some((action, target)) = other.split_once('|') else {
                    return CallbackAction::Invalid;
                };
                let kind = match action {
                    "video" => MediaKind::Video,
                    "audio" => MediaKind::Audio,
                    _ => return CallbackAction::Invalid,
                };
                let target = target.trim();
                if target.is_empty() {
                    return CallbackAction::Invalid;
                }
                let url = if is_video_id(target) {
                    canonical_watch_url(target)
                } else {
                    target.to_string()
                };
                CallbackAction::Download { kind, url }
            }
        }
    }

    /// Builds the payload for a download button, preferring the short video id.
    /// Returns `None` when the payload would not fit Telegram's limit.
    pub fn download_payload(kind: MediaKind, url: &str) -> Option<String> {
        let target = extract_video_id(url).unwrap_or_else(|| url.trim().to_string());
        let payload = format!("{}|{}", kind.as_str(), target);
        (payload.len() <= MAX_CALLBACK_DATA_BYTES).then_some(payload)
    }

    pub fn as_payload(&self) -> Option<String> {
        match self {
            CallbackAction::Start => Some("start".to_string()),
            CallbackAction::About => Some("about".to_string()),
            CallbackAction::Terms => Some("terms".to_string()),
            CallbackAction::HelpStart => Some("help_start".to_string()),
            CallbackAction::Cancel => Some("cancel".to_string()),
            CallbackAction::Download { kind, url } => Self::download_payload(*kind, url),
            CallbackAction::Invalid => None,
        }
    }
}
