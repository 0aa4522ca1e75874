//! Storage backends for result records:
//! - `memory`: process-local, for tests and one-off runs
//! - `file`: a JSON document on disk

mod file;
mod memory;

pub use file::FileResultsStore;
pub use memory::MemoryResultsStore;
