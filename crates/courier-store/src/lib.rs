// Abstract document store over hierarchical paths, plus the append-only
// change feeds layered on top of it. The in-memory implementation backs the
// exchange server and all tests; remote document databases implement the
// same contract.

pub mod changes;
pub mod document;
pub mod memory;
pub mod store;
pub mod testing;

mod error;

pub use changes::{Change, ChangeLog};
pub use document::{Collection, Document};
pub use error::StoreError;
pub use memory::Mem;
pub use store::{DocumentStore, DocumentsOpts, NowFn};
