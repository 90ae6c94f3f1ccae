use alloy_primitives::{Address, U256};

use crate::contract::{Message, PulseChat};

/// A public chat message as stored by the contract.
///
/// Identity is `message_id` alone; two messages with the same sender, content
/// and timestamp are still distinct if their ids differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub message_id: U256,
    pub sender: Address,
    pub content: String,
    /// Seconds since Unix epoch
    pub timestamp: u64,
}

impl ChatMessage {
    pub fn new(message_id: U256, sender: Address, content: impl Into<String>, timestamp: u64) -> Self {
        Self {
            message_id,
            sender,
            content: content.into(),
            timestamp,
        }
    }

    /// Whether `account` authored this message
    pub fn is_from(&self, account: Address) -> bool {
        self.sender == account
    }
}

impl From<Message> for ChatMessage {
    fn from(msg: Message) -> Self {
        Self {
            message_id: msg.messageId,
            sender: msg.sender,
            content: msg.content,
            timestamp: msg.timestamp.saturating_to(),
        }
    }
}

impl From<PulseChat::MessageSent> for ChatMessage {
    fn from(event: PulseChat::MessageSent) -> Self {
        Self {
            message_id: event.messageId,
            sender: event.sender,
            content: event.content,
            timestamp: event.timestamp.saturating_to(),
        }
    }
}

impl From<&ChatMessage> for Message {
    fn from(msg: &ChatMessage) -> Self {
        Message {
            sender: msg.sender,
            content: msg.content.clone(),
            timestamp: U256::from(msg.timestamp),
            messageId: msg.message_id,
        }
    }
}
