use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Telegram network error: {message}")]
    TelegramNetworkError { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Telegram API error {code}: {description}")]
    TelegramApiError { code: i64, description: String },

    #[error("Required tool not found: {tool}")]
    ToolMissing { tool: String },

    #[error("Download failed: {message}")]
    DownloadFailed { message: String },

    #[error("File too large: {size} bytes exceeds the {limit} bytes limit")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

pub type Result<T> = std::result::Result<T, BotError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Telegram,
    Media,
    Filesystem,
    Input,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl BotError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BotError::TelegramNetworkError { .. } | BotError::Timeout { .. } => ErrorCategory::Network,
            BotError::IoError(_) => ErrorCategory::Filesystem,
            BotError::SerializationError(_) | BotError::TelegramApiError { .. } => {
                ErrorCategory::Telegram
            }
            BotError::ConfigError { .. }
            | BotError::MissingConfigError { .. }
            | BotError::InvalidConfigValueError { .. }
            | BotError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            BotError::ToolMissing { .. }
            | BotError::DownloadFailed { .. }
            | BotError::FileTooLarge { .. } => ErrorCategory::Media,
            BotError::ValidationError { .. } => ErrorCategory::Input,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            BotError::ValidationError { .. } | BotError::FileTooLarge { .. } => ErrorSeverity::Low,
            BotError::TelegramNetworkError { .. }
            | BotError::Timeout { .. }
            | BotError::DownloadFailed { .. } => ErrorSeverity::Medium,
            BotError::SerializationError(_)
            | BotError::TelegramApiError { .. }
            | BotError::IoError(_) => ErrorSeverity::High,
            BotError::ConfigError { .. }
            | BotError::MissingConfigError { .. }
            | BotError::InvalidConfigValueError { .. }
            | BotError::ConfigValidationError { .. }
            | BotError::ToolMissing { .. } => ErrorSeverity::Critical,
        }
    }

    /// Short operator-facing explanation, printed to stderr by the binary.
    pub fn user_friendly_message(&self) -> String {
        match self {
            BotError::MissingConfigError { field } => {
                format!("Configuration value '{}' is required but was not provided", field)
            }
            BotError::InvalidConfigValueError { field, reason, .. } => {
                format!("Configuration value '{}' is invalid: {}", field, reason)
            }
            BotError::ConfigValidationError { field, message } => {
                format!("Configuration '{}' could not be loaded: {}", field, message)
            }
            BotError::ConfigError { message } => format!("Configuration problem: {}", message),
            BotError::TelegramApiError { code: 401, .. } => {
                "Telegram rejected the bot token (401 Unauthorized)".to_string()
            }
            BotError::TelegramApiError { code: 409, .. } => {
                "Another instance is already polling updates for this bot (409 Conflict)".to_string()
            }
            BotError::TelegramApiError { code, description } => {
                format!("Telegram answered with error {}: {}", code, description)
            }
            BotError::ToolMissing { tool } => format!("'{}' is not installed or not on PATH", tool),
            BotError::TelegramNetworkError { .. } => "Could not reach the Telegram API".to_string(),
            BotError::Timeout { operation } => format!("'{}' took too long", operation),
            BotError::IoError(e) => format!("Filesystem operation failed: {}", e),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            BotError::MissingConfigError { .. } => {
                "Set TELEGRAM_BOT_TOKEN or add `token` under [telegram] in tubegrab.toml"
            }
            BotError::InvalidConfigValueError { .. }
            | BotError::ConfigValidationError { .. }
            | BotError::ConfigError { .. } => "Review tubegrab.toml and the command line flags",
            BotError::TelegramApiError { code: 401, .. } => {
                "Request a new token from @BotFather and update the configuration"
            }
            BotError::TelegramApiError { code: 409, .. } => {
                "Stop the other instance or delete its webhook before polling"
            }
            BotError::TelegramApiError { .. } | BotError::SerializationError(_) => {
                "Check the Telegram API status and the configured api_url"
            }
            BotError::ToolMissing { .. } => {
                "Install ffmpeg and yt-dlp (pip install -r requirements.txt) or use the container image"
            }
            BotError::TelegramNetworkError { .. } | BotError::Timeout { .. } => {
                "Check network connectivity and retry in a few minutes"
            }
            BotError::IoError(_) => "Make sure the temp directory exists and is writable",
            BotError::DownloadFailed { .. } => "Try another video or retry later",
            BotError::FileTooLarge { .. } => "Use a shorter video or download the MP3 instead",
            BotError::ValidationError { .. } => "Send a valid YouTube link",
        }
    }
}
