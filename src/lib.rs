pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{TelegramClient, TempStorage, YtDlp};
pub use config::TomlConfig;
pub use core::{bot::BotEngine, handlers::UpdateHandler};
pub use utils::error::{BotError, Result};
