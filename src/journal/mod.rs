pub mod gateway;
pub mod store;
pub mod types;

pub use gateway::{EntryStore, SqliteEntryStore, StoreError};
pub use types::{Category, Entry, EntryFilter, EntryUpdate, NewEntry, OwnerId};
