use alloy_sol_types::SolEvent;
use futures::StreamExt;
use pulse_core::contract::PulseChat::MessageSent;
use pulse_core::types::ChatMessage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::transport::LogStream;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
struct HandleInner {
    released: AtomicBool,
    pump: JoinHandle<()>,
}

/// Release handle for a live `MessageSent` subscription.
///
/// Cloneable so several cleanup paths can hold it; `release` is idempotent
/// and only the first call tears the subscription down.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    inner: Arc<HandleInner>,
}

impl SubscriptionHandle {
    fn new(pump: JoinHandle<()>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                released: AtomicBool::new(false),
                pump,
            }),
        }
    }

    /// Stop delivering events. Returns true if this call performed the release.
    pub fn release(&self) -> bool {
        if self.inner.released.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.inner.pump.abort();
        debug!("MessageSent subscription released");
        true
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::SeqCst)
    }
}

/// Live feed of decoded `MessageSent` events.
///
/// Dropping the subscription releases it.
#[derive(Debug)]
pub struct MessageSubscription {
    receiver: mpsc::Receiver<ChatMessage>,
    handle: SubscriptionHandle,
}

impl MessageSubscription {
    /// Spawn the task that decodes raw logs into messages
    pub(crate) fn spawn(logs: LogStream) -> Self {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let pump = tokio::spawn(pump_events(logs, tx));
        Self {
            receiver: rx,
            handle: SubscriptionHandle::new(pump),
        }
    }

    /// Next event, or `None` once the subscription is released or the
    /// underlying stream ends
    pub async fn next(&mut self) -> Option<ChatMessage> {
        if self.handle.is_released() {
            return None;
        }
        self.receiver.recv().await
    }

    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    pub fn unsubscribe(&self) -> bool {
        self.handle.release()
    }
}

impl Drop for MessageSubscription {
    fn drop(&mut self) {
        self.handle.release();
    }
}

async fn pump_events(mut logs: LogStream, tx: mpsc::Sender<ChatMessage>) {
    while let Some(log) = logs.next().await {
        match MessageSent::decode_log(&log.inner) {
            Ok(event) => {
                let message = ChatMessage::from(event.data);
                if tx.send(message).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                // Undecodable events are skipped; the next poll covers them
                warn!(
                    error = %e,
                    tx_hash = ?log.transaction_hash,
                    "Failed to decode MessageSent log"
                );
            }
        }
    }
    debug!("MessageSent log stream ended");
}
