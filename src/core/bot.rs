use crate::adapters::telegram::Me;
use crate::core::handlers::{bot_commands, UpdateHandler};
use crate::domain::ports::MediaSource;
use crate::utils::error::{BotError, Result};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Long-polling loop. Every update is handled on its own task so a slow
/// download never blocks the menus of other users.
pub struct BotEngine<M: MediaSource + 'static> {
    handler: Arc<UpdateHandler<M>>,
    poll_timeout: u32,
    offset: i32,
    tasks: JoinSet<()>,
}

impl<M: MediaSource + 'static> BotEngine<M> {
    pub fn new(handler: Arc<UpdateHandler<M>>, poll_timeout: u64) -> Self {
        Self {
            handler,
            poll_timeout: u32::try_from(poll_timeout).unwrap_or(u32::MAX),
            offset: 0,
            tasks: JoinSet::new(),
        }
    }

    pub fn offset(&self) -> i32 {
        self.offset
    }

    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Checks the token and publishes the command menu.
    pub async fn initialize(&self) -> Result<Me> {
        let me = self.handler.api().get_me().await?;
        tracing::info!(
            "🤖 Connected as @{} (id {})",
            me.user.username.as_deref().unwrap_or(me.user.first_name.as_str()),
            me.user.id
        );

        // a missing menu is cosmetic
        if let Err(e) = self.handler.api().set_my_commands(&bot_commands()).await {
            tracing::warn!("Could not register bot commands: {}", e);
        }
        Ok(me)
    }

    /// Fetches one batch of updates, spawns a task per update and advances the offset.
    pub async fn poll_once(&mut self) -> Result<usize> {
        let updates = self
            .handler
            .api()
            .get_updates(self.offset, self.poll_timeout)
            .await?;

        self.reap_finished();
        self.handler.limiter().prune(Utc::now());

        let count = updates.len();
        for update in updates {
            self.offset = self.offset.max(update.id.as_offset());
            let handler = Arc::clone(&self.handler);
            let update_id = update.id.0;
            self.tasks.spawn(async move {
                if let Err(e) = handler.handle(update).await {
                    tracing::error!(
                        "❌ Update {} failed: {} (Category: {:?}, Severity: {:?})",
                        update_id,
                        e,
                        e.category(),
                        e.severity()
                    );
                }
            });
        }

        if count > 0 {
            tracing::debug!("Dispatched {} updates, next offset {}", count, self.offset);
        }
        Ok(count)
    }

    /// Polls until `shutdown` resolves, then waits for in-flight updates.
    /// Only an unauthorized token stops the loop with an error.
    pub async fn run<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.initialize().await?;
        tracing::info!("✅ Bot is running, waiting for messages");

        tokio::pin!(shutdown);
        let mut backoff = INITIAL_BACKOFF;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("🛑 Shutdown requested");
                    break;
                }
                polled = self.poll_once() => match polled {
                    Ok(_) => backoff = INITIAL_BACKOFF,
                    Err(e @ BotError::TelegramApiError { code: 401, .. }) => return Err(e),
                    Err(e) => {
                        tracing::warn!("⚠️ Polling failed: {}. Retrying in {:?}", e, backoff);
                        tokio::select! {
                            _ = &mut shutdown => {
                                tracing::info!("🛑 Shutdown requested");
                                break;
                            }
                            _ = tokio::time::sleep(backoff) => {}
                        }
                        backoff = next_backoff(backoff);
                    }
                },
            }
        }

        self.drain().await;
        self.handler.monitor().log_stats("shutdown");
        Ok(())
    }

    pub async fn drain(&mut self) {
        if !self.tasks.is_empty() {
            tracing::info!("⏳ Waiting for {} in-flight updates", self.tasks.len());
        }
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Update task panicked: {}", e);
            }
        }
    }

    fn reap_finished(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            if let Err(e) = joined {
                tracing::error!("Update task panicked: {}", e);
            }
        }
    }
}

pub fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}
