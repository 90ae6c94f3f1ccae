use std::sync::Arc;

use crate::backend::KeyValueBackend;
use crate::feed::MessageFeed;
use crate::private::PrivateMessageStore;

/// Client-side state shared between the synchronizer and the presentation
pub struct ChatStore {
    pub feed: Arc<MessageFeed>,
    pub private: Arc<PrivateMessageStore>,
}

impl ChatStore {
    pub fn new(window: usize, backend: Arc<dyn KeyValueBackend>) -> Self {
        Self {
            feed: Arc::new(MessageFeed::new(window)),
            private: Arc::new(PrivateMessageStore::new(backend)),
        }
    }
}
