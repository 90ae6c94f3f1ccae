mod backend;
mod feed;
mod private;
mod store;
mod sync_state;

pub use backend::{FileBackend, KeyValueBackend, MemoryBackend};
pub use feed::{FeedUpdate, FeedView, MergeOutcome, MessageFeed};
pub use private::{conversation_key, PrivateMessageStore, KEY_PREFIX};
pub use store::ChatStore;
pub use sync_state::{SyncMode, SyncState, SyncStats};
