pub mod bot;
pub mod format;
pub mod handlers;
pub mod messages;
pub mod preflight;
pub mod rate_limit;

pub use crate::domain::model::{CallbackAction, DownloadedMedia, MediaKind, VideoInfo};
pub use crate::domain::ports::MediaSource;
pub use crate::utils::error::Result;
