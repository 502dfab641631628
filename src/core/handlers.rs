use crate::adapters::storage::TempStorage;
use crate::adapters::telegram::{
    BotCommand, CallbackQuery, InlineKeyboardMarkup, Message, TelegramClient, Update, UpdateKind, UploadMeta,
};
use crate::core::messages::{self, FailureKind, Presets};
use crate::core::rate_limit::{RateDecision, RateLimiter};
use crate::domain::link::is_valid_youtube_url;
use crate::domain::model::{CallbackAction, MediaKind};
use crate::domain::ports::MediaSource;
use crate::utils::error::{BotError, Result};
use crate::utils::monitor::JobMonitor;
use std::path::Path;
use tokio::sync::Semaphore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    About,
}

impl Command {
    /// `/start`, `/help@my_bot extra` ... Unknown commands yield `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim().split_whitespace().next()?.strip_prefix('/')?;
        let name = word.split('@').next().unwrap_or(word);
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Command::Start),
            "help" => Some(Command::Help),
            "about" => Some(Command::About),
            _ => None,
        }
    }
}

pub fn bot_commands() -> Vec<BotCommand> {
    [
        ("start", "✨ Iniciar el bot y ver instrucciones"),
        ("help", "📚 Ver guía de uso"),
        ("about", "ℹ️ Información sobre el bot"),
    ]
    .into_iter()
    .map(|(command, description)| BotCommand::new(command, description))
    .collect()
}

/// Where a callback's message lives, plus who pressed the button.
#[derive(Debug, Clone, Copy)]
struct Origin {
    chat_id: i64,
    message_id: i32,
    user_id: i64,
}

pub struct UpdateHandler<M: MediaSource> {
    api: TelegramClient,
    media: M,
    storage: TempStorage,
    limiter: RateLimiter,
    presets: Presets,
    download_slots: Semaphore,
    monitor: JobMonitor,
}

impl<M: MediaSource> UpdateHandler<M> {
    pub fn new(
        api: TelegramClient,
        media: M,
        storage: TempStorage,
        limiter: RateLimiter,
        presets: Presets,
        max_concurrent_downloads: usize,
        monitor: JobMonitor,
    ) -> Self {
        Self {
            api,
            media,
            storage,
            limiter,
            presets,
            download_slots: Semaphore::new(max_concurrent_downloads.max(1)),
            monitor,
        }
    }

    pub fn api(&self) -> &TelegramClient {
        &self.api
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn monitor(&self) -> &JobMonitor {
        &self.monitor
    }

    pub async fn handle(&self, update: Update) -> Result<()> {
        match update.kind {
            UpdateKind::CallbackQuery(query) => self.handle_callback(query).await,
            UpdateKind::Message(message) => self.handle_message(message).await,
            _ => {
                tracing::debug!("Ignoring update {:?} without message or callback", update.id);
                Ok(())
            }
        }
    }

    async fn handle_message(&self, message: Message) -> Result<()> {
        let Some(text) = message.text() else {
            return Ok(());
        };
        let chat_id = message.chat.id.0;

        if text.trim_start().starts_with('/') {
            return match Command::parse(text) {
                Some(Command::Start) => {
                    let (text, keyboard) = messages::welcome(&self.presets);
                    self.api.send_message(chat_id, &text, Some(&keyboard)).await.map(|_| ())
                }
                Some(Command::Help) => self
                    .api
                    .send_message(chat_id, &messages::help_command(&self.presets), None)
                    .await
                    .map(|_| ()),
                Some(Command::About) => self
                    .api
                    .send_message(chat_id, &messages::about_command(&self.presets), None)
                    .await
                    .map(|_| ()),
                None => {
                    tracing::debug!("Ignoring unknown command in chat {}", chat_id);
                    Ok(())
                }
            };
        }

        let user_id = message
            .from
            .as_ref()
            .and_then(|u| i64::try_from(u.id.0).ok())
            .unwrap_or(chat_id);
        self.handle_link(chat_id, user_id, text.trim()).await
    }

    async fn handle_link(&self, chat_id: i64, user_id: i64, url: &str) -> Result<()> {
        if !is_valid_youtube_url(url) {
            self.api.send_message(chat_id, &messages::invalid_url(), None).await?;
            return Ok(());
        }

        // refused before the quota is touched
        let Some(keyboard) = messages::format_keyboard(&self.presets, url) else {
            tracing::info!("Link from user {} is too long for a download button", user_id);
            self.api.send_message(chat_id, &messages::link_too_long(), None).await?;
            return Ok(());
        };

        match self.limiter.check(user_id) {
            RateDecision::Limited { retry_after } => {
                tracing::info!("User {} is rate limited for {:?}", user_id, retry_after);
                let text = messages::rate_limited(&self.presets, retry_after.as_secs());
                self.api.send_message(chat_id, &text, None).await?;
                return Ok(());
            }
            RateDecision::Allowed { remaining } => {
                tracing::debug!("User {} has {} requests left in the window", user_id, remaining);
            }
        }

        let status = self.api.send_message(chat_id, &messages::analyzing(), None).await?;

        let text = match self.media.probe(url).await {
            Ok(info) => messages::video_card(&info),
            Err(e) => {
                tracing::warn!("Could not extract video info for {}: {}", url, e);
                messages::video_card_unavailable()
            }
        };

        self.edit(chat_id, status.id.0, &text, Some(&keyboard)).await
    }

    async fn handle_callback(&self, query: CallbackQuery) -> Result<()> {
        // stale queries cannot be answered anymore, which is harmless
        if let Err(e) = self.api.answer_callback_query(&query.id).await {
            tracing::debug!("answerCallbackQuery failed: {}", e);
        }

        let Some(message) = query.regular_message() else {
            tracing::debug!("Callback {} has no accessible message attached", query.id);
            return Ok(());
        };
        let origin = Origin {
            chat_id: message.chat.id.0,
            message_id: message.id.0,
            user_id: i64::try_from(query.from.id.0).unwrap_or(message.chat.id.0),
        };

        let action = CallbackAction::parse(query.data.as_deref().unwrap_or_default());
        let (text, keyboard) = match action {
            CallbackAction::Start => messages::welcome(&self.presets),
            CallbackAction::About => messages::about(&self.presets),
            CallbackAction::Terms => messages::terms(),
            CallbackAction::HelpStart => messages::quick_guide(&self.presets),
            CallbackAction::Cancel => {
                return self
                    .edit(origin.chat_id, origin.message_id, &messages::cancelled(), None)
                    .await
            }
            CallbackAction::Invalid => {
                return self
                    .edit(origin.chat_id, origin.message_id, &messages::invalid_request(), None)
                    .await
            }
            CallbackAction::Download { kind, url } => {
                return self.run_download(origin, kind, &url).await;
            }
        };

        self.edit(origin.chat_id, origin.message_id, &text, Some(&keyboard)).await
    }

    /// "message is not modified" happens when a button is pressed twice.
    async fn edit(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<()> {
        match self.api.edit_message_text(chat_id, message_id, text, keyboard).await {
            Err(BotError::TelegramApiError { code: 400, description })
                if description.contains("message is not modified") =>
            {
                tracing::debug!("Skipped identical edit of message {}", message_id);
                Ok(())
            }
            other => other,
        }
    }

    async fn run_download(&self, origin: Origin, kind: MediaKind, url: &str) -> Result<()> {
        let status = messages::download_status(&self.presets, kind);
        self.edit(origin.chat_id, origin.message_id, &status, None).await?;

        let outcome = {
            let _slot = self
                .download_slots
                .acquire()
                .await
                .map_err(|_| BotError::DownloadFailed {
                    message: "download queue is shut down".to_string(),
                })?;

            match self.storage.job_dir(&origin.user_id.to_string()).await {
                Ok(job_dir) => {
                    let delivered = self.deliver(origin.chat_id, kind, url, &job_dir).await;
                    self.storage.cleanup(&job_dir).await;
                    delivered
                }
                Err(e) => Err(e),
            }
        };

        match outcome {
            Ok(size) => {
                self.monitor.job_succeeded(size);
                let (text, keyboard) = messages::completed();
                self.api.send_message(origin.chat_id, &text, Some(&keyboard)).await?;
            }
            Err(e) => {
                self.monitor.job_failed();
                tracing::error!(
                    "Error downloading {} for user {}: {} (Category: {:?})",
                    url,
                    origin.user_id,
                    e,
                    e.category()
                );
                let text = FailureKind::classify(&e).message(&self.presets);
                let keyboard = messages::failure_keyboard(kind, url);
                self.api.send_message(origin.chat_id, &text, Some(&keyboard)).await?;
            }
        }
        Ok(())
    }

    /// Downloads, checks the size and uploads. Returns the number of bytes sent.
    async fn deliver(&self, chat_id: i64, kind: MediaKind, url: &str, job_dir: &Path) -> Result<u64> {
        let media = self.media.download(url, kind, job_dir).await?;
        let size = tokio::fs::metadata(&media.path).await?.len();

        if size > self.presets.max_file_size {
            return Err(BotError::FileTooLarge {
                size,
                limit: self.presets.max_file_size,
            });
        }

        let meta = UploadMeta {
            caption: messages::caption(&self.presets, &media.title, media.duration, size, kind),
            title: Some(media.title.clone()),
            duration: Some(media.duration),
        };

        match kind {
            MediaKind::Video => self.api.send_video(chat_id, &media.path, &meta).await?,
            MediaKind::Audio => self.api.send_audio(chat_id, &media.path, &meta).await?,
        };

        tracing::info!("📤 Sent {} '{}' ({} bytes) to chat {}", kind.as_str(), media.title, size, chat_id);
        Ok(size)
    }
}
