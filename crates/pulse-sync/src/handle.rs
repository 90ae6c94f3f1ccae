use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::engine::SyncEvent;

/// Control handle for a running [`MessageSynchronizer`](crate::MessageSynchronizer).
///
/// Stopping ends both the poll timer and the live subscription. `stop` is
/// idempotent and also runs on drop.
pub struct SyncHandle {
    shutdown: broadcast::Sender<()>,
    refresh: Arc<Notify>,
    events: broadcast::Sender<SyncEvent>,
    refresh_delay: Duration,
    stopped: AtomicBool,
    task: Option<JoinHandle<()>>,
}

impl SyncHandle {
    pub(crate) fn new(
        shutdown: broadcast::Sender<()>,
        refresh: Arc<Notify>,
        events: broadcast::Sender<SyncEvent>,
        refresh_delay: Duration,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            shutdown,
            refresh,
            events,
            refresh_delay,
            stopped: AtomicBool::new(false),
            task: Some(task),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Poll now instead of waiting for the next tick
    pub fn request_refresh(&self) {
        if !self.is_stopped() {
            self.refresh.notify_one();
        }
    }

    /// Poll once after the configured post-send delay, so a message just
    /// confirmed shows up even if its event never arrives
    pub fn refresh_after_send(&self) {
        self.refresh_after(self.refresh_delay);
    }

    pub fn refresh_after(&self, delay: Duration) {
        if self.is_stopped() {
            return;
        }
        let refresh = self.refresh.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            refresh.notify_one();
        });
    }

    /// Stop syncing. Returns true if this call performed the stop.
    pub fn stop(&self) -> bool {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }
        // no receiver means the loop already exited
        let _ = self.shutdown.send(());
        debug!("Message sync stop requested");
        true
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Stop and wait for the loop to finish
    pub async fn join(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    error!(error = %e, "Message sync task failed");
                }
            }
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
