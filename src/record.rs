pub mod codec;
pub mod error;
pub mod manager;
pub mod memory;
pub mod trx;

pub use error::StorageError;
pub use manager::{EngineRef, IndexHint, Record, RecordManager, RecordScanner, Rid};
pub use memory::MemoryEngine;
pub use trx::Trx;
