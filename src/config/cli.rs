use crate::config::toml_config::TomlConfig;
use clap::Parser;
use std::path::PathBuf;

#[derive(Clone, Parser)]
#[command(name = "tubegrab")]
#[command(about = "Telegram bot that turns YouTube links into MP4 or MP3 files")]
pub struct CliConfig {
    /// Path to a TOML configuration file (defaults to ./tubegrab.toml when present)
    #[arg(short, long, env = "TUBEGRAB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Bot token issued by BotFather
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Directory for transient downloads
    #[arg(long, env = "TUBEGRAB_TEMP_DIR")]
    pub temp_dir: Option<String>,

    /// Telegram Bot API base URL (for a local Bot API server)
    #[arg(long, env = "TUBEGRAB_API_URL")]
    pub api_url: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log job statistics and process resource usage")]
    pub monitor: bool,

    /// Verify yt-dlp, ffmpeg, ffprobe and the temp directory, then exit
    #[arg(long)]
    pub check: bool,
}

impl std::fmt::Debug for CliConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CliConfig")
            .field("config", &self.config)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("temp_dir", &self.temp_dir)
            .field("api_url", &self.api_url)
            .field("verbose", &self.verbose)
            .field("monitor", &self.monitor)
            .field("check", &self.check)
            .finish()
    }
}

impl CliConfig {
    /// Command line and environment values win over the file.
    pub fn apply_overrides(&self, config: &mut TomlConfig) {
        if let Some(token) = &self.token {
            config.telegram.token = Some(token.clone());
        }
        if let Some(temp_dir) = &self.temp_dir {
            config.downloads.temp_dir = temp_dir.clone();
        }
        if let Some(api_url) = &self.api_url {
            config.telegram.api_url = api_url.clone();
        }
        if self.monitor {
            config.monitoring.enabled = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_file_values() {
        let cli = CliConfig::parse_from([
            "tubegrab",
            "--temp-dir",
            "/data/tmp",
            "--api-url",
            "http://localhost:8081",
            "--monitor",
        ]);

        let mut config = TomlConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.downloads.temp_dir, "/data/tmp");
        assert_eq!(config.telegram.api_url, "http://localhost:8081");
        assert!(config.monitoring.enabled);
    }

    #[test]
    fn test_debug_output_redacts_token() {
        let cli = CliConfig::parse_from([
            "tubegrab",
            "--token",
            "123456:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw",
            "--verbose",
        ]);
        let rendered = format!("{:?}", cli);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("AAHdqTcv"));
        assert!(rendered.contains("verbose: true"));
    }

    #[test]
    fn test_check_flag() {
        let cli = CliConfig::parse_from(["tubegrab", "--check"]);
        assert!(cli.check);
        assert!(!cli.verbose);
    }
}
