//! adaptest-store — storage backends for the adaptest engines.
//!
//! Two implementations of `adaptest_core::store::Store`: an in-memory store
//! for tests and simulation, and a SQLite store whose uniqueness constraints
//! back the engine's ordering and idempotence guarantees.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
