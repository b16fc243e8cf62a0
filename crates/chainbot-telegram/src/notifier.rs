//! Trade notifications.

use crate::api::TelegramApi;
use crate::format;
use async_trait::async_trait;
use chainbot_core::error::NotifyError;
use chainbot_core::traits::Notifier;
use chainbot_core::types::Side;
use chainbot_engine::{EngineEvent, EventKind};
use chainbot_store::{NewPaperTrade, Store};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Sends notifications as bot messages. Private chat ids equal user ids.
pub struct TelegramNotifier {
    api: Arc<TelegramApi>,
}

impl TelegramNotifier {
    pub fn new(api: Arc<TelegramApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, chat_id: i64, text: &str) -> Result<(), NotifyError> {
        self.api
            .send_message(chat_id, text)
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))
    }
}

fn paper_trade(event: &EngineEvent) -> Option<NewPaperTrade> {
    let (side, quantity, price, pnl, reason) = match &event.kind {
        EventKind::Opened {
            quantity, price, ..
        } => (Side::Buy, *quantity, *price, None, None),
        EventKind::Closed {
            quantity,
            price,
            pnl,
            reason,
        } => (
            Side::Sell,
            *quantity,
            *price,
            Some(*pnl),
            Some(reason.as_str().to_string()),
        ),
        EventKind::Rejected { .. } | EventKind::Failed { .. } => return None,
    };
    Some(NewPaperTrade {
        strategy_id: event.job_id,
        user_id: event.user_id,
        symbol: event.symbol.clone(),
        side,
        quantity,
        price,
        pnl,
        reason,
        created_at: event.timestamp,
    })
}

/// Record and forward one event.
pub async fn handle_event(store: &Store, notifier: &dyn Notifier, event: &EngineEvent) {
    if let Some(trade) = paper_trade(event) {
        if let Err(e) = store.add_paper_trade(&trade).await {
            error!(job_id = event.job_id, error = %e, "failed to record paper trade");
        }
    }

    // Refusals repeat on every signal while the cause persists.
    if let EventKind::Rejected { reason } = &event.kind {
        info!(user_id = event.user_id, job_id = event.job_id, %reason, "signal rejected");
        return;
    }

    let notify = match store.get_settings(event.user_id).await {
        Ok(settings) => settings.notifications,
        Err(e) => {
            warn!(user_id = event.user_id, error = %e, "settings lookup failed, notifying anyway");
            true
        }
    };
    if !notify {
        debug!(user_id = event.user_id, "notifications off");
        return;
    }
    if let Err(e) = notifier.notify(event.user_id, &format::event(event)).await {
        warn!(user_id = event.user_id, job_id = event.job_id, error = %e, "notification failed");
    }
}

/// Drain scheduler events until the channel closes or `shutdown` fires.
pub async fn pump_events(
    mut events: mpsc::Receiver<EngineEvent>,
    store: Store,
    notifier: Arc<dyn Notifier>,
    shutdown: CancellationToken,
) {
    info!("event pump started");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => handle_event(&store, notifier.as_ref(), &event).await,
                None => break,
            },
        }
    }
    info!("event pump stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainbot_engine::CloseReason;
    use chainbot_store::SettingsUpdate;
    use rust_decimal_macros::dec;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(i64, String)>>,
    }

    #[async_trait]
    impl Notifier for Recorder {
        async fn notify(&self, chat_id: i64, text: &str) -> Result<(), NotifyError> {
            self.sent.lock().await.push((chat_id, text.to_string()));
            Ok(())
        }
    }

    fn closed(user_id: i64) -> EngineEvent {
        EngineEvent {
            job_id: 3,
            user_id,
            symbol: "BTC".into(),
            timestamp: 1_700_000_000_000,
            kind: EventKind::Closed {
                quantity: dec!(0.01),
                price: dec!(40000),
                pnl: dec!(25.5),
                reason: CloseReason::Signal,
            },
        }
    }

    #[tokio::test]
    async fn test_trade_is_recorded_and_sent() {
        let store = Store::in_memory().await.unwrap();
        let recorder = Recorder::default();
        handle_event(&store, &recorder, &closed(5)).await;

        let trades = store.list_paper_trades(5, 10).await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].side, Side::Sell);
        assert_eq!(trades[0].pnl, Some(dec!(25.5)));
        assert_eq!(trades[0].reason.as_deref(), Some("signal"));

        let sent = recorder.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 5);
        assert!(sent[0].1.contains("sold"));
    }

    #[tokio::test]
    async fn test_muted_user_still_gets_history() {
        let store = Store::in_memory().await.unwrap();
        store
            .update_settings(
                5,
                &SettingsUpdate {
                    notifications: Some(false),
                    ..SettingsUpdate::default()
                },
            )
            .await
            .unwrap();
        let recorder = Recorder::default();
        handle_event(&store, &recorder, &closed(5)).await;

        assert_eq!(store.list_paper_trades(5, 10).await.unwrap().len(), 1);
        assert!(recorder.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_rejection_is_logged_not_sent() {
        let store = Store::in_memory().await.unwrap();
        let recorder = Recorder::default();
        let event = EngineEvent {
            kind: EventKind::Rejected {
                reason: "max positions".into(),
            },
            ..closed(6)
        };
        handle_event(&store, &recorder, &event).await;
        assert!(store.list_paper_trades(6, 10).await.unwrap().is_empty());
        assert!(recorder.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_pump_stops_when_channel_closes() {
        let store = Store::in_memory().await.unwrap();
        let recorder: Arc<dyn Notifier> = Arc::new(Recorder::default());
        let (tx, rx) = mpsc::channel(4);
        tx.send(closed(7)).await.unwrap();
        drop(tx);
        pump_events(rx, store.clone(), recorder, CancellationToken::new()).await;
        assert_eq!(store.list_paper_trades(7, 10).await.unwrap().len(), 1);
    }
}
