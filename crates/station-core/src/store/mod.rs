//! Persistence sink for readings.

mod traits;
pub use traits::{ReadingStore, StoredReading};

mod memory;
pub use memory::MemoryStore;

mod jsonl;
pub use jsonl::JsonlStore;
