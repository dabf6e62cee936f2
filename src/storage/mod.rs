mod file_store;
mod key_value;
mod session;

pub use file_store::FileKeyValueStore;
pub use key_value::{InMemoryKeyValueStore, KeyValueStore, StorageError};
pub use session::SessionStore;
