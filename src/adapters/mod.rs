// Adapters layer: concrete implementations for external systems
// (Telegram Bot API, yt-dlp, local scratch storage).

pub mod storage;
pub mod telegram;
pub mod ytdlp;

pub use storage::TempStorage;
pub use telegram::TelegramClient;
pub use ytdlp::YtDlp;
