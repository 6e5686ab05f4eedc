//! The composite-key index and its entry storage.

pub mod key_index;
pub mod store;

pub use key_index::{Index, IndexStats, UpdateMode};
pub use store::{Documents, EntryStore};
