pub mod backend;
pub mod cache;
pub mod error;
pub mod pg;
pub mod store;

pub use backend::{DocumentBackend, ListedDocument, MemoryBackend, StoredDocument};
pub use error::StoreError;
pub use pg::PgBackend;
pub use store::DocumentStore;
