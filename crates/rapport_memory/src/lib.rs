pub mod debounce;
pub mod sqlite;
pub mod store;

pub use debounce::{Completion, DebounceBuffer, Flushed};
pub use sqlite::SqliteRelationshipStore;
pub use store::InMemoryRelationshipStore;
