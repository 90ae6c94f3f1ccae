use alloy::primitives::Address;
use pulse_core::types::PrivateMessage;
use pulse_core::validation::validate_message;
use pulse_core::Result;
use pulse_store::PrivateMessageStore;
use std::sync::Arc;

/// An open one-to-one conversation. Messages never leave this machine.
pub struct PrivateChat {
    store: Arc<PrivateMessageStore>,
    me: Address,
    peer: Address,
    peer_name: String,
}

impl PrivateChat {
    pub fn open(store: Arc<PrivateMessageStore>, me: Address, peer: Address, peer_name: String) -> Self {
        Self {
            store,
            me,
            peer,
            peer_name,
        }
    }

    pub fn peer(&self) -> Address {
        self.peer
    }

    pub fn peer_name(&self) -> &str {
        &self.peer_name
    }

    pub fn history(&self) -> Vec<PrivateMessage> {
        self.store.load(self.me, self.peer)
    }

    pub fn send(&self, content: &str) -> Result<PrivateMessage> {
        validate_message(content)?;
        self.store.send(self.me, self.peer, content.trim())
    }

    pub fn is_own(&self, message: &PrivateMessage) -> bool {
        message.sender == self.me
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::ChatError;
    use pulse_store::MemoryBackend;

    fn store() -> Arc<PrivateMessageStore> {
        Arc::new(PrivateMessageStore::new(Arc::new(MemoryBackend::new())))
    }

    #[test]
    fn test_both_sides_share_history() {
        let store = store();
        let alice = Address::repeat_byte(0xA1);
        let bob = Address::repeat_byte(0xB0);
        let from_alice = PrivateChat::open(store.clone(), alice, bob, "bob".to_string());
        let from_bob = PrivateChat::open(store, bob, alice, "alice".to_string());

        let sent = from_alice.send("  hi bob ").unwrap();
        from_bob.send("hi alice").unwrap();

        let history = from_bob.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], sent);
        assert_eq!(history[0].content, "hi bob");
        assert!(from_alice.is_own(&history[0]));
        assert!(!from_bob.is_own(&history[0]));
    }

    #[test]
    fn test_blank_message_is_rejected() {
        let chat = PrivateChat::open(store(), Address::repeat_byte(1), Address::repeat_byte(2), "peer".to_string());
        assert!(matches!(chat.send("   "), Err(ChatError::InvalidInput(_))));
        assert!(chat.history().is_empty());
    }
}
