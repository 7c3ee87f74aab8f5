//! Dedup store implementations.
//!
//! - `SqliteDedupStore`: durable, file-backed (production)
//! - `MemoryDedupStore`: in-process (testing)

mod memory;
mod sqlite;

pub use memory::MemoryDedupStore;
pub use sqlite::SqliteDedupStore;
