use pulse_core::types::ChatMessage;
use pulse_core::SyncConfig;
use pulse_gateway::{ChainGateway, MessageSubscription};
use pulse_store::MessageFeed;
use std::sync::Arc;
use tokio::select;
use tokio::sync::{broadcast, Notify};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::handle::SyncHandle;

const EVENT_CAPACITY: usize = 256;

/// Change notification for the chat view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A poll completed; `appended` holds the messages it added and `total`
    /// the highest on-chain count seen so far
    Refreshed {
        total: u64,
        appended: Vec<ChatMessage>,
    },
    /// A live event added a message
    Appended(ChatMessage),
    /// A poll failed and the feed was left as it was
    PollFailed,
}

/// Keeps a [`MessageFeed`] in step with the chain.
///
/// Two paths feed the same merge: a periodic snapshot poll and the live
/// `MessageSent` subscription. Either path alone is enough to converge; the
/// poll catches events the subscription missed, and the subscription fills the
/// gap between polls.
pub struct MessageSynchronizer {
    gateway: ChainGateway,
    feed: Arc<MessageFeed>,
    config: SyncConfig,
    events: broadcast::Sender<SyncEvent>,
}

impl MessageSynchronizer {
    pub fn new(gateway: ChainGateway, feed: Arc<MessageFeed>, config: SyncConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            gateway,
            feed,
            config,
            events,
        }
    }

    pub fn feed(&self) -> &Arc<MessageFeed> {
        &self.feed
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Fetch the total count and the latest window, then merge.
    ///
    /// Returns false if the poll failed. The feed keeps its contents either
    /// way.
    pub async fn poll_once(&self) -> bool {
        let total = self.gateway.get_total_messages().await;

        match self.gateway.get_latest_messages(self.config.message_window).await {
            Ok(messages) => {
                let fetched = messages.len();
                let outcome = self.feed.apply_snapshot(total, messages);
                debug!(
                    total = total,
                    fetched = fetched,
                    appended = outcome.appended.len(),
                    "Poll merged"
                );
                let _ = self.events.send(SyncEvent::Refreshed {
                    total: self.feed.total_on_chain(),
                    appended: outcome.appended,
                });
                true
            }
            Err(e) => {
                warn!(error = %e, "Error fetching messages");
                self.feed.record_poll_failure();
                let _ = self.events.send(SyncEvent::PollFailed);
                false
            }
        }
    }

    /// Merge one live event. Returns true if the message was new.
    pub fn apply_event(&self, message: ChatMessage) -> bool {
        let message_id = message.message_id;
        if self.feed.apply_event(message.clone()) {
            let _ = self.events.send(SyncEvent::Appended(message));
            true
        } else {
            debug!(message_id = %message_id, "Event already in feed");
            false
        }
    }

    /// Spawn the sync loop. Polls immediately, then every poll interval, and
    /// applies live events as they arrive until the handle is stopped.
    pub fn start(self) -> SyncHandle {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let refresh = Arc::new(Notify::new());
        let events = self.events.clone();
        let refresh_delay = self.config.refresh_after_send;

        let task = tokio::spawn({
            let refresh = refresh.clone();
            async move { self.run(shutdown_rx, refresh).await }
        });

        SyncHandle::new(shutdown_tx, refresh, events, refresh_delay, task)
    }

    async fn run(self, mut shutdown: broadcast::Receiver<()>, refresh: Arc<Notify>) {
        let mut subscription = self.gateway.watch_messages().await;
        if subscription.is_none() {
            warn!("No live message subscription, relying on polling");
        }

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            poll_interval = ?self.config.poll_interval,
            window = self.config.message_window,
            live = subscription.is_some(),
            "Message sync started"
        );

        loop {
            select! {
                _ = shutdown.recv() => {
                    info!("Shutdown signal received");
                    break;
                }

                _ = interval.tick() => {
                    self.poll_once().await;
                }

                _ = refresh.notified() => {
                    debug!("Refresh requested");
                    self.poll_once().await;
                    interval.reset();
                }

                event = next_event(&mut subscription) => match event {
                    Some(message) => {
                        self.apply_event(message);
                    }
                    None => {
                        warn!("Message subscription ended, relying on polling");
                        subscription = None;
                    }
                }
            }
        }

        if let Some(subscription) = subscription.take() {
            subscription.unsubscribe();
        }
        let stats = self.feed.sync_state().stats;
        info!(
            snapshots = stats.snapshots_applied,
            events = stats.events_applied,
            duplicates = stats.duplicates_skipped,
            poll_failures = stats.poll_failures,
            last_poll_at = ?stats.last_poll_at,
            "Message sync stopped"
        );
    }
}

/// Next live event; pends forever without a subscription
async fn next_event(subscription: &mut Option<MessageSubscription>) -> Option<ChatMessage> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}
