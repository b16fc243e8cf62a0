//! Long-polling update loop.

use crate::api::{Message, TelegramApi};
use crate::error::TelegramError;
use crate::router::{MessageContext, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

const POLL_BACKOFF: Duration = Duration::from_secs(5);

pub struct Bot {
    api: Arc<TelegramApi>,
    router: Arc<Router>,
    poll_timeout_secs: u64,
}

impl Bot {
    pub fn new(api: Arc<TelegramApi>, router: Arc<Router>, poll_timeout_secs: u64) -> Self {
        Self {
            api,
            router,
            poll_timeout_secs,
        }
    }

    /// Serve updates until `shutdown` fires, then wait for in-flight handlers.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), TelegramError> {
        let me = self.api.get_me().await?;
        info!(
            bot = me.username.as_deref().unwrap_or(&me.first_name),
            "connected to Telegram"
        );

        match self.router.resume_strategies().await {
            Ok(count) if count > 0 => info!(count, "strategies resumed"),
            Ok(_) => {}
            Err(e) => error!(error = %e, "could not load active strategies"),
        }

        let tracker = TaskTracker::new();
        let mut offset: Option<i64> = None;
        loop {
            let updates = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.api.get_updates(offset, self.poll_timeout_secs) => result,
            };
            match updates {
                Ok(updates) => {
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        if let Some(message) = update.message {
                            let api = Arc::clone(&self.api);
                            let router = Arc::clone(&self.router);
                            tracker.spawn(async move { handle_message(&api, &router, message).await });
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "polling failed, backing off");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(POLL_BACKOFF) => {}
                    }
                }
            }
        }

        tracker.close();
        tracker.wait().await;
        info!("bot stopped");
        Ok(())
    }
}

async fn handle_message(api: &TelegramApi, router: &Router, message: Message) {
    let Some(text) = message.text.as_deref() else {
        return;
    };
    let Some(ctx) = MessageContext::from_message(&message) else {
        return;
    };
    let Some(reply) = router.handle_text(&ctx, text).await else {
        return;
    };
    debug!(user_id = ctx.user_id, chat_id = ctx.chat_id, "command handled");

    if reply.delete_source {
        if let Err(e) = api.delete_message(ctx.chat_id, ctx.message_id).await {
            warn!(chat_id = ctx.chat_id, error = %e, "could not delete message holding a key");
        }
    }
    if let Err(e) = api.send_message(ctx.chat_id, &reply.text).await {
        warn!(chat_id = ctx.chat_id, error = %e, "reply failed");
    }
}
