use crate::adapters::storage::TempStorage;
use crate::config::toml_config::TomlConfig;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const TOOL_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Ok(String),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub target: String,
    pub status: CheckStatus,
}

impl CheckResult {
    pub fn passed(&self) -> bool {
        matches!(self.status, CheckStatus::Ok(_))
    }
}

/// Outcome of the startup checks: external tools and scratch directory.
#[derive(Debug, Clone, Default)]
pub struct PreflightReport {
    pub checks: Vec<CheckResult>,
}

impl PreflightReport {
    pub fn is_ready(&self) -> bool {
        self.checks.iter().all(CheckResult::passed)
    }

    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passed())
    }

    pub fn render(&self) -> String {
        self.checks
            .iter()
            .map(|c| match &c.status {
                CheckStatus::Ok(detail) => format!("✅ {:<10} {} ({})", c.name, c.target, detail),
                CheckStatus::Failed(reason) => format!("❌ {:<10} {} ({})", c.name, c.target, reason),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Runs `<program> <version_arg>` and keeps the first line of output.
pub async fn check_tool(name: &str, program: &str, version_arg: &str) -> CheckResult {
    let mut cmd = Command::new(program);
    cmd.arg(version_arg)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let status = match tokio::time::timeout(TOOL_TIMEOUT, cmd.output()).await {
        Err(_) => CheckStatus::Failed("timed out".to_string()),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckStatus::Failed("not found on PATH".to_string())
        }
        Ok(Err(e)) => CheckStatus::Failed(e.to_string()),
        Ok(Ok(output)) if !output.status.success() => {
            CheckStatus::Failed(format!("exited with {}", output.status))
        }
        Ok(Ok(output)) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let first_line = stdout.lines().next().unwrap_or("").trim().to_string();
            CheckStatus::Ok(first_line)
        }
    };

    CheckResult {
        name: name.to_string(),
        target: program.to_string(),
        status,
    }
}

pub async fn check_temp_dir(storage: &TempStorage) -> CheckResult {
    let status = match tokio::fs::create_dir_all(storage.root()).await {
        Err(e) => CheckStatus::Failed(e.to_string()),
        Ok(()) => match storage.check_writable().await {
            Ok(()) => CheckStatus::Ok("writable".to_string()),
            Err(e) => CheckStatus::Failed(e.to_string()),
        },
    };
    CheckResult {
        name: "temp_dir".to_string(),
        target: storage.root().display().to_string(),
        status,
    }
}

pub async fn run_preflight(config: &TomlConfig, storage: &TempStorage) -> PreflightReport {
    let media = &config.media;
    let (ytdlp, ffmpeg, ffprobe, temp_dir) = tokio::join!(
        check_tool("yt-dlp", &media.ytdlp_path, "--version"),
        check_tool("ffmpeg", &media.ffmpeg_path, "-version"),
        check_tool("ffprobe", &media.ffprobe_path, "-version"),
        check_temp_dir(storage),
    );

    let report = PreflightReport {
        checks: vec![ytdlp, ffmpeg, ffprobe, temp_dir],
    };
    for failure in report.failures() {
        tracing::warn!("Preflight check '{}' failed for {}", failure.name, failure.target);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_tool_fails() {
        let result = check_tool("ffmpeg", "/nonexistent/ffmpeg", "-version").await;
        assert!(!result.passed());
        assert_eq!(result.status, CheckStatus::Failed("not found on PATH".to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_available_tool_reports_first_line() {
        // `echo` stands in for a tool that prints its version
        let result = check_tool("echo", "echo", "v1.2.3").await;
        assert_eq!(result.status, CheckStatus::Ok("v1.2.3".to_string()));
    }

    #[tokio::test]
    async fn test_temp_dir_check_creates_directory() {
        let base = TempDir::new().unwrap();
        let storage = TempStorage::new(base.path().join("temp_downloads"), Duration::from_secs(60));

        let result = check_temp_dir(&storage).await;
        assert!(result.passed());
        assert!(base.path().join("temp_downloads").is_dir());
    }

    #[test]
    fn test_report_rendering() {
        let report = PreflightReport {
            checks: vec![
                CheckResult {
                    name: "yt-dlp".to_string(),
                    target: "yt-dlp".to_string(),
                    status: CheckStatus::Ok("2025.01.15".to_string()),
                },
                CheckResult {
                    name: "ffmpeg".to_string(),
                    target: "ffmpeg".to_string(),
                    status: CheckStatus::Failed("not found on PATH".to_string()),
                },
            ],
        };
        assert!(!report.is_ready());
        assert_eq!(report.failures().count(), 1);
        assert!(report.check("yt-dlp").unwrap().passed());
        let rendered = report.render();
        assert!(rendered.contains("✅ yt-dlp"));
        assert!(rendered.contains("❌ ffmpeg"));
    }
}
