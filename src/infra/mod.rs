//! Bundled adapters for the store and notification ports.

pub mod notify;
pub mod store;

pub use notify::{ChannelNotifier, LogNotifier, NotificationEvent, RecordingNotifier};
pub use store::{InMemoryStore, JsonlStore, StoredRecord};
