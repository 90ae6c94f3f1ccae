//! Keeps the public message feed in step with the chain by merging periodic
//! snapshot polls with live `MessageSent` events.

mod engine;
mod handle;

pub use engine::{MessageSynchronizer, SyncEvent};
pub use handle::SyncHandle;
