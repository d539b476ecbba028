pub mod batch;
pub mod engine;
pub mod memory;
pub mod table;

pub use batch::{BatchOutcome, Change, WriteBatch};
pub use engine::ApnStore;
pub use memory::InMemoryApnStore;
pub use table::ApnTable;
