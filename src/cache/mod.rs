//! Cache Module
//!
//! In-memory caching with lazy expiration, synchronized on demand with a
//! remote key-value table.

mod codec;
mod entry;
mod memory;
mod remote;
mod service;
mod store;
mod sync;
mod value;


// Re-export public types
pub use codec::{format_expiration, parse_expiration, RowCodec};
pub use entry::{expiration_from, max_expiration, CacheEntry};
pub use memory::{MemoryTableStore, DEFAULT_PAGE_SIZE};
pub use remote::{
    RemoteError, RowStream, TableRow, TableStore, EXPIRATION_COLUMN, PARTITION_KEY_COLUMN,
    RESERVED_COLUMNS, ROW_KEY_COLUMN,
};
pub use service::CacheService;
pub use store::LocalStore;
pub use sync::{MergeMode, SyncEngine, SyncReport};
pub use value::{flatten_serialize, FlatMap, Flatten};
