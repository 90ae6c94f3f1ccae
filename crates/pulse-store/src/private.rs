use alloy_primitives::Address;
use parking_lot::Mutex;
use pulse_core::types::{now_millis, PrivateMessage};
use pulse_core::Result;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::backend::KeyValueBackend;

pub const KEY_PREFIX: &str = "pulse_private_";

/// Storage key for the conversation between `a` and `b`.
///
/// Both addresses are case-folded and sorted, so either participant derives
/// the same key.
pub fn conversation_key(a: &str, b: &str) -> String {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("{}{}_{}", KEY_PREFIX, low, high)
}

/// Per-conversation message log kept only on this machine.
///
/// Every append rewrites the full list. Appends made through one store are
/// serialized; separate processes sharing a backend race with
/// last-write-wins.
pub struct PrivateMessageStore {
    backend: Arc<dyn KeyValueBackend>,
    write_lock: Mutex<()>,
}

impl PrivateMessageStore {
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self {
            backend,
            write_lock: Mutex::new(()),
        }
    }

    pub fn key_for(self_addr: Address, peer: Address) -> String {
        conversation_key(&self_addr.to_string(), &peer.to_string())
    }

    /// Conversation history, oldest first. Missing or unreadable history is
    /// empty.
    pub fn load(&self, self_addr: Address, peer: Address) -> Vec<PrivateMessage> {
        self.load_key(&Self::key_for(self_addr, peer))
    }

    fn load_key(&self, key: &str) -> Vec<PrivateMessage> {
        let raw = match self.backend.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, key = key, "Failed to read private messages");
                return Vec::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(messages) => messages,
            Err(e) => {
                warn!(error = %e, key = key, "Stored private messages are corrupt, treating as empty");
                Vec::new()
            }
        }
    }

    fn store_key(&self, key: &str, messages: &[PrivateMessage]) -> Result<()> {
        let json = serde_json::to_string(messages)?;
        self.backend.set(key, &json)
    }

    /// Append `message` to the conversation and rewrite it
    pub fn append(&self, self_addr: Address, peer: Address, message: PrivateMessage) -> Result<()> {
        let key = Self::key_for(self_addr, peer);
        let _guard = self.write_lock.lock();

        let mut messages = self.load_key(&key);
        messages.push(message);
        self.store_key(&key, &messages)?;

        debug!(key = %key, count = messages.len(), "Private message stored");
        Ok(())
    }

    /// Compose a message from `self_addr` and append it. Ids are time-based
    /// and strictly increasing within the conversation.
    pub fn send(&self, self_addr: Address, peer: Address, content: &str) -> Result<PrivateMessage> {
        let key = Self::key_for(self_addr, peer);
        let _guard = self.write_lock.lock();

        let mut messages = self.load_key(&key);
        let now = now_millis();
        let id = messages
            .last()
            .map(|last| now.max(last.id + 1))
            .unwrap_or(now);
        let message = PrivateMessage::new(id, self_addr, content, now);
        messages.push(message.clone());
        self.store_key(&key, &messages)?;

        debug!(key = %key, count = messages.len(), "Private message sent");
        Ok(message)
    }

    /// Forget a conversation
    pub fn clear(&self, self_addr: Address, peer: Address) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.backend.remove(&Self::key_for(self_addr, peer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FileBackend, MemoryBackend};

    fn alice() -> Address {
        Address::repeat_byte(0xAA)
    }

    fn bob() -> Address {
        Address::repeat_byte(0xBB)
    }

    fn memory_store() -> (Arc<MemoryBackend>, PrivateMessageStore) {
        let backend = Arc::new(MemoryBackend::new());
        let store = PrivateMessageStore::new(backend.clone());
        (backend, store)
    }

    #[test]
    fn test_key_is_symmetric_and_case_insensitive() {
        let a = "0xAbCdEf0000000000000000000000000000000001";
        let b = "0x1234560000000000000000000000000000000002";

        assert_eq!(conversation_key(a, b), conversation_key(b, a));
        assert_eq!(conversation_key(a, b), conversation_key(&a.to_uppercase().replace("0X", "0x"), b));
        assert_eq!(
            conversation_key(a, b),
            "pulse_private_0x1234560000000000000000000000000000000002_0xabcdef0000000000000000000000000000000001"
        );
        assert_eq!(
            PrivateMessageStore::key_for(alice(), bob()),
            PrivateMessageStore::key_for(bob(), alice())
        );
    }

    #[test]
    fn test_load_without_history_is_empty() {
        let (_, store) = memory_store();
        assert!(store.load(alice(), bob()).is_empty());
    }

    #[test]
    fn test_append_then_load() {
        let (_, store) = memory_store();
        store
            .append(alice(), bob(), PrivateMessage::new(1, alice(), "hi", 1))
            .unwrap();
        let before = store.load(alice(), bob()).len();

        let message = PrivateMessage::new(2, bob(), "hey", 2);
        store.append(bob(), alice(), message.clone()).unwrap();

        let history = store.load(alice(), bob());
        assert_eq!(history.len(), before + 1);
        assert_eq!(history.last(), Some(&message));
    }

    #[test]
    fn test_corrupt_payload_is_empty_history() {
        let (backend, store) = memory_store();
        backend
            .set(&PrivateMessageStore::key_for(alice(), bob()), "{not json")
            .unwrap();

        assert!(store.load(alice(), bob()).is_empty());

        // appending over a corrupt payload starts a fresh history
        store
            .append(alice(), bob(), PrivateMessage::new(7, alice(), "again", 7))
            .unwrap();
        assert_eq!(store.load(bob(), alice()).len(), 1);
    }

    #[test]
    fn test_send_ids_strictly_increase() {
        let (_, store) = memory_store();
        let first = store.send(alice(), bob(), "one").unwrap();
        let second = store.send(alice(), bob(), "two").unwrap();
        let third = store.send(bob(), alice(), "three").unwrap();

        assert!(second.id > first.id);
        assert!(third.id > second.id);
        assert_eq!(third.sender, bob());
        assert_eq!(store.load(alice(), bob()).len(), 3);
    }

    #[test]
    fn test_concurrent_appends_are_not_lost() {
        let (_, store) = memory_store();
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store
                        .append(alice(), bob(), PrivateMessage::new(i, alice(), "x", i))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.load(alice(), bob()).len(), 8);
    }

    #[test]
    fn test_history_survives_reload_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = PrivateMessageStore::new(Arc::new(FileBackend::new(dir.path()).unwrap()));
            store.send(alice(), bob(), "persisted").unwrap();
        }

        let store = PrivateMessageStore::new(Arc::new(FileBackend::new(dir.path()).unwrap()));
        let history = store.load(bob(), alice());
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "persisted");

        store.clear(alice(), bob()).unwrap();
        assert!(store.load(alice(), bob()).is_empty());
    }
}
