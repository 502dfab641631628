use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tubegrab::core::messages::Presets;
use tubegrab::core::preflight::run_preflight;
use tubegrab::core::rate_limit::RateLimiter;
use tubegrab::utils::error::{BotError, ErrorSeverity};
use tubegrab::utils::monitor::JobMonitor;
use tubegrab::utils::{logger, validation::Validate};
use tubegrab::{BotEngine, CliConfig, TelegramClient, TempStorage, TomlConfig, UpdateHandler, YtDlp};

fn exit_code(severity: ErrorSeverity) -> i32 {
    match severity {
        ErrorSeverity::Low => 0,      // 警告，但成功
        ErrorSeverity::Medium => 2,   // 可重試
        ErrorSeverity::High => 1,     // 處理錯誤
        ErrorSeverity::Critical => 3, // 系統錯誤
    }
}

fn fail(e: &BotError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(exit_code(e.severity()).max(1));
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    let mut config = match TomlConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(exit_code(e.severity()).max(1));
        }
    };
    cli.apply_overrides(&mut config);

    if cli.check {
        logger::init_cli_logger(cli.verbose);
    } else {
        logger::init_bot_logger(cli.verbose, &config.logging);
    }

    tracing::info!("Starting tubegrab v{}", env!("CARGO_PKG_VERSION"));
    if cli.verbose {
        tracing::debug!("Command line: {:?}", cli);
        tracing::debug!("Effective config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        fail(&e);
    }

    let storage = TempStorage::new(config.temp_dir(), config.stale_after());

    if cli.check {
        let report = run_preflight(&config, &storage).await;
        println!("{}", report.render());
        if report.is_ready() {
            println!("✅ Environment ready");
            return Ok(());
        }
        std::process::exit(1);
    }

    let token = match config.require_token() {
        Ok(token) => token.to_string(),
        Err(e) => fail(&e),
    };

    match storage.prepare().await {
        Ok(0) => {}
        Ok(removed) => tracing::info!("🧹 Removed {} leftover entries from {}", removed, storage.root().display()),
        Err(e) => fail(&e),
    }

    let report = run_preflight(&config, &storage).await;
    if let Some(ytdlp) = report.check("yt-dlp").filter(|c| !c.passed()) {
        fail(&BotError::ToolMissing {
            tool: ytdlp.target.clone(),
        });
    }
    for failure in report.failures() {
        tracing::warn!(
            "⚠️ {} is unavailable ({}); conversions may fail",
            failure.name,
            failure.target
        );
    }

    let monitor = JobMonitor::new(config.monitoring.enabled);
    if monitor.is_enabled() {
        tracing::info!("🔍 System monitoring enabled");
    }

    let api = match TelegramClient::new(
        &config.telegram.api_url,
        &token,
        Duration::from_secs(config.telegram.request_timeout_seconds),
    ) {
        Ok(api) => api,
        Err(e) => fail(&e),
    };
    let media = YtDlp::new(
        &config.media,
        Duration::from_secs(config.downloads.download_timeout_seconds),
    );
    let limiter = RateLimiter::new(config.rate_limit.max_downloads, config.rate_window());

    let handler = UpdateHandler::new(
        api,
        media,
        storage,
        limiter,
        Presets::from_config(&config),
        config.downloads.max_concurrent,
        monitor,
    );
    let engine = BotEngine::new(Arc::new(handler), config.telegram.poll_timeout_seconds);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    match engine.run(shutdown).await {
        Ok(()) => {
            tracing::info!("👋 Bot stopped");
            Ok(())
        }
        Err(e) => fail(&e),
    }
}
