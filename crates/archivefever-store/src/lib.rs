//! Archive Fever Store - append-only persistence for thoughts, identities,
//! crystallized works, discovered texts and research requests

pub mod error;
pub mod memory;
pub mod resilient;
pub mod sqlite;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use resilient::ResilientStore;
pub use sqlite::SqliteStore;
pub use store::{NewCrystallizedWork, NewUpload, Store, DEFAULT_COMMENT_AUTHOR, DEFAULT_UPLOAD_AUTHOR};
