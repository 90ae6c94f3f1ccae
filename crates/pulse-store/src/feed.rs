use alloy_primitives::U256;
use parking_lot::RwLock;
use pulse_core::types::{now_secs, ChatMessage};
use std::collections::BTreeMap;
use tracing::{debug, trace};

use crate::sync_state::SyncState;

/// One input to the feed: a poll snapshot or a single live event
#[derive(Debug, Clone)]
pub enum FeedUpdate {
    Snapshot {
        total: u64,
        messages: Vec<ChatMessage>,
    },
    Event(ChatMessage),
}

/// Result of applying one update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Messages that were not in the feed before, in id order
    pub appended: Vec<ChatMessage>,
    /// Messages skipped because their id was already present
    pub duplicates: usize,
}

impl MergeOutcome {
    pub fn is_empty(&self) -> bool {
        self.appended.is_empty()
    }
}

/// What the chat view should render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedView {
    Loading,
    Empty,
    Messages(Vec<ChatMessage>),
}

#[derive(Debug, Default)]
struct FeedInner {
    /// message_id -> message, ordered by id
    messages: BTreeMap<U256, ChatMessage>,
    total_on_chain: u64,
    state: SyncState,
}

/// Working set of the most recent public messages.
///
/// Poll snapshots and live events go through the same merge, keyed by
/// `message_id` only. The merge is idempotent and commutative, so the final
/// contents do not depend on how polls and events interleave. The feed keeps
/// at most `window` messages, dropping the lowest ids first.
#[derive(Debug)]
pub struct MessageFeed {
    window: usize,
    inner: RwLock<FeedInner>,
}

impl MessageFeed {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            inner: RwLock::new(FeedInner::default()),
        }
    }

    /// Apply a poll snapshot or an event
    pub fn merge(&self, update: FeedUpdate) -> MergeOutcome {
        let mut inner = self.inner.write();

        let (incoming, is_snapshot) = match update {
            FeedUpdate::Snapshot { total, messages } => {
                // the chain only grows; a fallback zero must not shrink it
                inner.total_on_chain = inner.total_on_chain.max(total);
                inner.state.record_snapshot(now_secs());
                inner.state.complete_initial_load();
                (messages, true)
            }
            FeedUpdate::Event(message) => (vec![message], false),
        };

        let mut outcome = MergeOutcome::default();
        let mut inserted = Vec::new();
        for message in incoming {
            if inner.messages.contains_key(&message.message_id) {
                outcome.duplicates += 1;
                continue;
            }
            inserted.push(message.message_id);
            inner.messages.insert(message.message_id, message);
        }

        while inner.messages.len() > self.window {
            if let Some((id, _)) = inner.messages.pop_first() {
                trace!(message_id = %id, "Message left the window");
            }
        }

        inserted.sort();
        outcome.appended = inserted
            .iter()
            .filter_map(|id| inner.messages.get(id).cloned())
            .collect();

        if !is_snapshot && !outcome.appended.is_empty() {
            inner.state.record_event();
        }
        inner.state.record_duplicates(outcome.duplicates);

        debug!(
            snapshot = is_snapshot,
            appended = outcome.appended.len(),
            duplicates = outcome.duplicates,
            held = inner.messages.len(),
            "Feed merged"
        );
        outcome
    }

    /// Merge a poll result
    pub fn apply_snapshot(&self, total: u64, messages: Vec<ChatMessage>) -> MergeOutcome {
        self.merge(FeedUpdate::Snapshot { total, messages })
    }

    /// Merge a live event. Returns true if the message was new.
    pub fn apply_event(&self, message: ChatMessage) -> bool {
        !self.merge(FeedUpdate::Event(message)).is_empty()
    }

    /// Record a poll that produced no data; the first one still ends loading
    pub fn record_poll_failure(&self) {
        let mut inner = self.inner.write();
        inner.state.record_poll_failure();
        inner.state.complete_initial_load();
    }

    /// Messages in id order
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.inner.read().messages.values().cloned().collect()
    }

    pub fn contains(&self, message_id: &U256) -> bool {
        self.inner.read().messages.contains_key(message_id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().messages.is_empty()
    }

    /// Total message count reported by the last successful poll
    pub fn total_on_chain(&self) -> u64 {
        self.inner.read().total_on_chain
    }

    pub fn sync_state(&self) -> SyncState {
        self.inner.read().state.clone()
    }

    pub fn view(&self) -> FeedView {
        let inner = self.inner.read();
        if inner.state.is_loading() {
            FeedView::Loading
        } else if inner.messages.is_empty() {
            FeedView::Empty
        } else {
            FeedView::Messages(inner.messages.values().cloned().collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;

    fn msg(id: u64, content: &str) -> ChatMessage {
        ChatMessage::new(U256::from(id), Address::repeat_byte(0x01), content, 1_700_000_000 + id)
    }

    fn ids(feed: &MessageFeed) -> Vec<u64> {
        feed.messages()
            .iter()
            .map(|m| m.message_id.saturating_to())
            .collect()
    }

    #[test]
    fn test_event_after_poll_is_not_duplicated() {
        let feed = MessageFeed::new(100);
        feed.apply_snapshot(2, vec![msg(1, "a"), msg(2, "b")]);

        assert!(!feed.apply_event(msg(2, "b")));
        assert_eq!(feed.len(), 2);
        assert_eq!(feed.sync_state().stats.duplicates_skipped, 1);
    }

    #[test]
    fn test_event_before_poll_is_kept() {
        let feed = MessageFeed::new(100);
        assert!(feed.apply_event(msg(3, "early")));

        let outcome = feed.apply_snapshot(3, vec![msg(1, "a"), msg(2, "b"), msg(3, "early")]);

        assert_eq!(ids(&feed), vec![1, 2, 3]);
        assert_eq!(outcome.duplicates, 1);
        assert_eq!(
            outcome.appended.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_identical_content_with_distinct_ids_is_kept() {
        let feed = MessageFeed::new(100);
        feed.apply_event(msg(1, "gm"));
        feed.apply_event(msg(2, "gm"));
        assert_eq!(feed.len(), 2);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let updates = vec![
            FeedUpdate::Snapshot {
                total: 3,
                messages: vec![msg(1, "a"), msg(2, "b"), msg(3, "c")],
            },
            FeedUpdate::Event(msg(3, "c")),
            FeedUpdate::Event(msg(4, "d")),
            FeedUpdate::Snapshot {
                total: 4,
                messages: vec![msg(2, "b"), msg(3, "c"), msg(4, "d")],
            },
            FeedUpdate::Event(msg(2, "b")),
        ];

        let forward = MessageFeed::new(100);
        for update in updates.iter().cloned() {
            forward.merge(update);
        }
        let backward = MessageFeed::new(100);
        for update in updates.iter().rev().cloned() {
            backward.merge(update);
        }

        assert_eq!(ids(&forward), vec![1, 2, 3, 4]);
        assert_eq!(forward.messages(), backward.messages());
    }

    #[test]
    fn test_window_keeps_most_recent() {
        let feed = MessageFeed::new(3);
        feed.apply_snapshot(5, (1..=5).map(|i| msg(i, "x")).collect());
        assert_eq!(ids(&feed), vec![3, 4, 5]);

        // an id older than the window is not reported as appended
        assert!(!feed.apply_event(msg(1, "x")));
        assert!(feed.apply_event(msg(6, "x")));
        assert_eq!(ids(&feed), vec![4, 5, 6]);
    }

    #[test]
    fn test_view_states() {
        let feed = MessageFeed::new(100);
        assert_eq!(feed.view(), FeedView::Loading);

        feed.apply_snapshot(0, Vec::new());
        assert_eq!(feed.view(), FeedView::Empty);
        assert_eq!(feed.total_on_chain(), 0);

        feed.apply_event(msg(1, "first"));
        assert_eq!(feed.view(), FeedView::Messages(vec![msg(1, "first")]));
    }

    #[test]
    fn test_failed_first_poll_ends_loading() {
        let feed = MessageFeed::new(100);
        feed.record_poll_failure();
        assert_eq!(feed.view(), FeedView::Empty);
        assert_eq!(feed.sync_state().stats.poll_failures, 1);
    }
}
