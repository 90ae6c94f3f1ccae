use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// A message exchanged in a private conversation.
///
/// Never leaves the local machine; `id` and `timestamp` are milliseconds since
/// Unix epoch at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateMessage {
    pub id: u64,
    pub sender: Address,
    pub content: String,
    pub timestamp: u64,
}

impl PrivateMessage {
    pub fn new(id: u64, sender: Address, content: impl Into<String>, timestamp: u64) -> Self {
        Self {
            id,
            sender,
            content: content.into(),
            timestamp,
        }
    }

    /// Compose a message stamped with the current time
    pub fn compose(sender: Address, content: impl Into<String>) -> Self {
        let now = super::now_millis();
        Self::new(now, sender, content, now)
    }
}
