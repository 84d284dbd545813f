//! Record store seam for video records.
//!
//! The persistent store is an external collaborator; this crate defines the
//! interface the pipeline consumes (single-row reads and narrow partial
//! updates, no multi-row transactions) plus an in-memory implementation used
//! by the dev worker binary and tests.

pub mod error;
pub mod memory;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryVideoStore;
pub use store::{VideoPatch, VideoStore};
