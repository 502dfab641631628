use crate::utils::error::{BotError, Result};
use crate::utils::validation::{
    validate_bot_token, validate_non_empty_string, validate_path, validate_range, validate_url,
    Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";
pub const DEFAULT_CONFIG_FILE: &str = "tubegrab.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub telegram: TelegramConfig,
    pub downloads: DownloadsConfig,
    pub media: MediaConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub token: Option<String>,
    pub api_url: String,
    pub poll_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadsConfig {
    pub temp_dir: String,
    pub max_file_size_mb: u64,
    pub max_concurrent: usize,
    pub stale_after_minutes: u64,
    pub download_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub ytdlp_path: String,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub video_max_height: u32,
    pub audio_bitrate_kbps: u32,
    pub probe_timeout_seconds: u64,
    pub socket_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_downloads: usize,
    pub window_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Empty or missing disables the file log.
    pub file: Option<String>,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: DEFAULT_API_URL.to_string(),
            poll_timeout_seconds: 30,
            request_timeout_seconds: 120,
        }
    }
}

// Hand-written so the token stays out of debug logs.
impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("poll_timeout_seconds", &self.poll_timeout_seconds)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            temp_dir: "temp_downloads".to_string(),
            max_file_size_mb: 49,
            max_concurrent: 2,
            stale_after_minutes: 60,
            download_timeout_seconds: 600,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: "yt-dlp".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            video_max_height: 720,
            audio_bitrate_kbps: 192,
            probe_timeout_seconds: 10,
            socket_timeout_seconds: 15,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_downloads: 10,
            window_seconds: 3600,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: Some("bot.log".to_string()),
            format: LogFormat::Compact,
        }
    }
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(BotError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Loads `path` when given, otherwise `tubegrab.toml` if it exists, otherwise defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| BotError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${TELEGRAM_BOT_TOKEN})，未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| BotError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn token(&self) -> Option<&str> {
        self.telegram.token.as_deref()
    }

    pub fn temp_dir(&self) -> PathBuf {
        PathBuf::from(&self.downloads.temp_dir)
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.downloads.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit.window_seconds)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.downloads.stale_after_minutes.saturating_mul(60))
    }

    /// The token is checked separately by [`TomlConfig::require_token`] so that
    /// `--check` works without credentials.
    pub fn validate_config(&self) -> Result<()> {
        validate_url("telegram.api_url", &self.telegram.api_url)?;
        validate_range("telegram.poll_timeout_seconds", self.telegram.poll_timeout_seconds, 0, 50)?;
        validate_range(
            "telegram.request_timeout_seconds",
            self.telegram.request_timeout_seconds,
            5,
            3600,
        )?;

        validate_path("downloads.temp_dir", &self.downloads.temp_dir)?;
        validate_range("downloads.max_file_size_mb", self.downloads.max_file_size_mb, 1, 2000)?;
        validate_range("downloads.max_concurrent", self.downloads.max_concurrent, 1, 16)?;
        validate_range(
            "downloads.download_timeout_seconds",
            self.downloads.download_timeout_seconds,
            10,
            7200,
        )?;
        validate_range("downloads.stale_after_minutes", self.downloads.stale_after_minutes, 1, 10_080)?;

        validate_non_empty_string("media.ytdlp_path", &self.media.ytdlp_path)?;
        validate_non_empty_string("media.ffmpeg_path", &self.media.ffmpeg_path)?;
        validate_non_empty_string("media.ffprobe_path", &self.media.ffprobe_path)?;
        validate_range("media.video_max_height", self.media.video_max_height, 144, 4320)?;
        validate_range("media.audio_bitrate_kbps", self.media.audio_bitrate_kbps, 32, 320)?;
        validate_range("media.probe_timeout_seconds", self.media.probe_timeout_seconds, 1, 300)?;
        validate_range("media.socket_timeout_seconds", self.media.socket_timeout_seconds, 1, 300)?;

        validate_range("rate_limit.max_downloads", self.rate_limit.max_downloads, 1, 10_000)?;
        validate_range("rate_limit.window_seconds", self.rate_limit.window_seconds, 1, 604_800)?;

        Ok(())
    }

    pub fn require_token(&self) -> Result<&str> {
        validate_bot_token("telegram.token", self.token())?;
        Ok(self.token().unwrap_or_default().trim())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_documented_limits() {
        let config = TomlConfig::default();
        assert_eq!(config.downloads.temp_dir, "temp_downloads");
        assert_eq!(config.max_file_size_bytes(), 49 * 1024 * 1024);
        assert_eq!(config.rate_limit.max_downloads, 10);
        assert_eq!(config.rate_window(), Duration::from_secs(3600));
        assert_eq!(config.media.video_max_height, 720);
        assert_eq!(config.media.audio_bitrate_kbps, 192);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml_config() {
        let toml_content = r#"
[telegram]
api_url = "http://127.0.0.1:8081"

[downloads]
temp_dir = "/tmp/tubegrab"
max_concurrent = 4

[logging]
format = "json"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.telegram.api_url, "http://127.0.0.1:8081");
        assert_eq!(config.downloads.temp_dir, "/tmp/tubegrab");
        assert_eq!(config.downloads.max_concurrent, 4);
        assert_eq!(config.downloads.max_file_size_mb, 49);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.media.ytdlp_path, "yt-dlp");
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TUBEGRAB_TEST_TOKEN", "123456:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw");

        let toml_content = r#"
[telegram]
token = "${TUBEGRAB_TEST_TOKEN}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.require_token().unwrap(), "123456:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw");

        std::env::remove_var("TUBEGRAB_TEST_TOKEN");
    }

    #[test]
    fn test_unresolved_env_var_is_missing_token() {
        let toml_content = r#"
[telegram]
token = "${TUBEGRAB_TOKEN_THAT_IS_NEVER_SET}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert!(matches!(
            config.require_token(),
            Err(BotError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_config_validation() {
        let toml_content = r#"
[telegram]
api_url = "invalid-url"
"#;
        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());

        let toml_content = r#"
[downloads]
max_concurrent = 0
"#;
        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeouts_and_retention_are_bounded() {
        for toml_content in [
            "[downloads]\nstale_after_minutes = 9223372036854775807\n",
            "[downloads]\nstale_after_minutes = 0\n",
            "[media]\nprobe_timeout_seconds = 9223372036854775807\n",
            "[media]\nprobe_timeout_seconds = 0\n",
            "[media]\nsocket_timeout_seconds = 0\n",
        ] {
            let config = TomlConfig::from_toml_str(toml_content).unwrap();
            assert!(
                matches!(config.validate_config(), Err(BotError::InvalidConfigValueError { .. })),
                "accepted {:?}",
                toml_content
            );
        }
    }

    #[test]
    fn test_stale_after_saturates_instead_of_overflowing() {
        let mut config = TomlConfig::default();
        config.downloads.stale_after_minutes = u64::MAX;
        assert_eq!(config.stale_after(), Duration::from_secs(u64::MAX));

        config.downloads.stale_after_minutes = 30;
        assert_eq!(config.stale_after(), Duration::from_secs(1800));
    }

    #[test]
    fn test_debug_output_redacts_token() {
        let mut config = TomlConfig::default();
        config.telegram.token = Some("123456:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw".to_string());
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("AAHdqTcv"));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[rate_limit]
max_downloads = 3
window_seconds = 60
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = TomlConfig::load(Some(temp_file.path())).unwrap();
        assert_eq!(config.rate_limit.max_downloads, 3);
        assert_eq!(config.rate_window(), Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let err = TomlConfig::from_toml_str("[telegram\napi_url = 1").unwrap_err();
        assert!(matches!(err, BotError::ConfigValidationError { .. }));
    }
}
