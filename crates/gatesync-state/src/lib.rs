//! gatesync-state — repository layer for the gateway synchronization core.
//!
//! Backed by [redb](https://docs.rs/redb), stores the raw control-plane
//! records the synchronizer reads (subscriptions, API keys) and the records
//! it writes (failure commands, distributed events).
//!
//! # Architecture
//!
//! All records are JSON-serialized into redb's `&[u8]` value columns.
//! Searches are full scans filtered in memory: the tables hold the
//! records of one gateway's environments, not a whole control plane.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks and blocking I/O threads.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
