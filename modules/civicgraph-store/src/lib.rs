//! Read-only access to the civic graph views.
//!
//! `GraphSource` is the seam: `ViewStore` answers it from Postgres,
//! `MemorySource` answers it from rows held in memory.

pub mod error;
pub mod memory;
pub mod source;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemorySource;
pub use source::{BridgeFilter, GraphSource, View};
pub use store::ViewStore;
